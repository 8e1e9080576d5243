//! Document-to-IR translation.
//!
//! One [`TranslationContext`] per run holds the mutable registry and the
//! schema memo; every translator threads it explicitly so independent runs
//! never share state.

pub(crate) mod content;
pub(crate) mod modes;
pub(crate) mod operation;
pub(crate) mod parameters;
pub(crate) mod schema;

use std::collections::BTreeMap;

use oas3::Spec;

use crate::compiler::{
  config::{Config, GeneratorMode},
  diagnostics::DiagnosticCollector,
  graph::SchemaGraph,
  ir::{Declaration, SourceFile, TypeUsage},
  naming::NameRegistry,
};

pub(crate) type TranslationResult<T> = anyhow::Result<T>;

/// Shared mutable state for one translation run.
pub(crate) struct TranslationContext<'a> {
  pub spec: &'a Spec,
  pub graph: &'a SchemaGraph,
  pub config: &'a Config,
  pub collector: &'a dyn DiagnosticCollector,
  pub registry: NameRegistry,
  /// Component key → memoized usage. Guarantees repeat translations of the
  /// same component resolve to the identical type.
  memo: BTreeMap<String, TypeUsage>,
  /// Declarations for translated component schemas, in component-key order.
  component_decls: Vec<Declaration>,
}

impl<'a> TranslationContext<'a> {
  pub(crate) fn new(
    spec: &'a Spec,
    graph: &'a SchemaGraph,
    config: &'a Config,
    collector: &'a dyn DiagnosticCollector,
  ) -> Self {
    Self {
      spec,
      graph,
      config,
      collector,
      registry: NameRegistry::new(config.naming.clone()),
      memo: BTreeMap::new(),
      component_decls: Vec::new(),
    }
  }

  pub(crate) fn memoized(&self, component_key: &str) -> Option<TypeUsage> {
    self.memo.get(component_key).cloned()
  }

  pub(crate) fn memoize(&mut self, component_key: &str, usage: TypeUsage) {
    self.memo.insert(component_key.to_owned(), usage);
  }

  pub(crate) fn push_component_decl(&mut self, decl: Declaration) {
    self.component_decls.push(decl);
  }

  pub(crate) fn take_component_decls(&mut self) -> Vec<Declaration> {
    std::mem::take(&mut self.component_decls)
  }

  /// Forwards any naming diagnostics accumulated since the last flush.
  pub(crate) fn flush_naming_diagnostics(&mut self) {
    for diagnostic in self.registry.drain_diagnostics() {
      self.collector.emit(diagnostic);
    }
  }
}

/// Capability shared by the three mode translators.
pub(crate) trait FileTranslator {
  fn mode(&self) -> GeneratorMode;

  /// Translates the whole document into one source file for this mode.
  fn translate_file(&self, ctx: &mut TranslationContext<'_>) -> TranslationResult<SourceFile>;
}

/// Dispatch table keyed by mode.
pub(crate) fn translator_for(mode: GeneratorMode) -> Box<dyn FileTranslator> {
  match mode {
    GeneratorMode::Types => Box::new(modes::TypesTranslator),
    GeneratorMode::Client => Box::new(modes::ClientTranslator),
    GeneratorMode::Server => Box::new(modes::ServerTranslator),
  }
}
