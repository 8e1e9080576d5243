//! Compiler configuration, supplied by the CLI or a build-tool caller.

use std::collections::BTreeMap;

use strum::Display;

use crate::compiler::{filter::FilterCriteria, naming::NamingOptions};

/// Which output artifact a translation pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum GeneratorMode {
  #[strum(to_string = "types")]
  Types,
  #[strum(to_string = "client")]
  Client,
  #[strum(to_string = "server")]
  Server,
}

/// Visibility applied to every emitted declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  Public,
  Crate,
  Private,
}

impl Visibility {
  #[must_use]
  pub fn keyword(self) -> &'static str {
    match self {
      Self::Public => "pub",
      Self::Crate => "pub(crate)",
      Self::Private => "",
    }
  }
}

/// A user-supplied replacement for a generated type.
///
/// The translator emits no declaration for the overridden component; every
/// reference site uses `rust_path` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOverride {
  pub rust_path: String,
}

#[derive(Debug, Clone)]
pub struct Config {
  /// One translation pass runs per mode, in the order given.
  pub modes: Vec<GeneratorMode>,
  pub visibility: Visibility,
  /// Extra `use` lines prepended to every generated file.
  pub additional_imports: Vec<String>,
  /// When set, the document is pruned before translation.
  pub filter: Option<FilterCriteria>,
  pub naming: NamingOptions,
  /// Component schema key → externally supplied type.
  pub type_overrides: BTreeMap<String, TypeOverride>,
  /// Collapse `nullable` schemas into plain `Option` without distinguishing
  /// absent from present-but-null.
  pub nullable_as_optional: bool,
  /// Upgrade per-item skip warnings into run-fatal errors.
  pub warnings_as_errors: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      modes: vec![GeneratorMode::Types],
      visibility: Visibility::default(),
      additional_imports: Vec::new(),
      filter: None,
      naming: NamingOptions::default(),
      type_overrides: BTreeMap::new(),
      nullable_as_optional: false,
      warnings_as_errors: false,
    }
  }
}

impl Config {
  #[must_use]
  pub fn override_for(&self, component_key: &str) -> Option<&TypeOverride> {
    self.type_overrides.get(component_key)
  }
}
