//! The stateful name registry for one translation run.
//!
//! Owns collision avoidance: every safe name issued within a scope is
//! remembered, and an exact collision gets a numeric suffix instead of
//! silently shadowing the earlier declaration. Component-key lookups are
//! memoized so repeat translation of the same schema yields the identical
//! [`TypeName`].

use std::collections::{BTreeMap, BTreeSet};

use super::{
  NamingOptions,
  identifiers::{to_case_ident, to_member_ident, to_type_ident_with},
  type_name::TypeName,
};
use crate::compiler::diagnostics::{Diagnostic, DiagnosticMessage};

/// What kind of declaration a component key names; part of the memo key so a
/// schema and a same-named parameter never collide in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentKind {
  Schema,
  Parameter,
  RequestBody,
  Response,
  Header,
}

impl ComponentKind {
  fn namespace(self) -> &'static str {
    match self {
      Self::Schema => "schemas",
      Self::Parameter => "parameters",
      Self::RequestBody => "request_bodies",
      Self::Response => "responses",
      Self::Header => "headers",
    }
  }
}

/// The issued safe name plus whether disambiguation changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedName {
  pub safe: String,
  pub disambiguated: bool,
}

/// Name state for one translation run. Not shareable across concurrent runs.
#[derive(Debug)]
pub struct NameRegistry {
  options: NamingOptions,
  /// scope id → safe names already issued in that scope.
  scopes: BTreeMap<String, BTreeSet<String>>,
  /// (kind, component key) → interned type name.
  memo: BTreeMap<(ComponentKind, String), TypeName>,
  pending_diagnostics: Vec<Diagnostic>,
}

impl NameRegistry {
  #[must_use]
  pub fn new(options: NamingOptions) -> Self {
    Self {
      options,
      scopes: BTreeMap::new(),
      memo: BTreeMap::new(),
      pending_diagnostics: Vec::new(),
    }
  }

  #[must_use]
  pub fn options(&self) -> &NamingOptions {
    &self.options
  }

  /// Deterministic, memoized type name for a named component.
  pub fn type_name(&mut self, component_key: &str, kind: ComponentKind) -> TypeName {
    if let Some(existing) = self.memo.get(&(kind, component_key.to_string())) {
      return existing.clone();
    }

    let parent = TypeName::root("components", "components").child(kind.namespace(), kind.namespace());
    let name = self.child_type_name(&parent, component_key);
    self.memo.insert((kind, component_key.to_string()), name.clone());
    name
  }

  /// Issues a safe type name for `raw` under `parent`, disambiguating within
  /// the parent's scope.
  pub fn child_type_name(&mut self, parent: &TypeName, raw: &str) -> TypeName {
    let proposal = to_type_ident_with(raw, self.options.strategy, &self.options.table);
    let scope = {
      let mut scope = parent.safe_path();
      scope.push_str("::types");
      scope
    };
    let issued = self.unique_name(&proposal, &scope);

    if issued.disambiguated {
      self.pending_diagnostics.push(Diagnostic::note(DiagnosticMessage::NameDisambiguated {
        raw: raw.to_string(),
        safe: issued.safe.clone(),
      }));
    }

    parent.child(raw, issued.safe)
  }

  /// Issues a unique member (field/argument) identifier within a scope.
  pub fn member_name(&mut self, raw: &str, scope: &str) -> IssuedName {
    let proposal = to_member_ident(raw, &self.options.table);
    self.unique_name(&proposal, scope)
  }

  /// Issues a unique enum case identifier within a scope from a wire value.
  pub fn case_name(&mut self, raw_value: &str, scope: &str) -> IssuedName {
    let proposal = to_case_ident(raw_value, &self.options.table);
    self.unique_name(&proposal, scope)
  }

  /// Core collision rule: first use of a proposal wins it unchanged;
  /// subsequent exact collisions get `_2`, `_3`, … appended.
  pub fn unique_name(&mut self, proposal: &str, scope: &str) -> IssuedName {
    let used = self.scopes.entry(scope.to_string()).or_default();

    if used.insert(proposal.to_string()) {
      return IssuedName {
        safe: proposal.to_string(),
        disambiguated: false,
      };
    }

    for suffix in 2usize.. {
      let candidate = format!("{proposal}_{suffix}");
      if used.insert(candidate.clone()) {
        return IssuedName {
          safe: candidate,
          disambiguated: true,
        };
      }
    }

    unreachable!("suffix counter is unbounded")
  }

  /// Diagnostics produced since the last drain, in emission order.
  pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
    std::mem::take(&mut self.pending_diagnostics)
  }
}

/// Derives the wire-visible raw name and declaration name for one oneOf
/// branch under a discriminator.
///
/// With an explicit mapping the mapping key is the wire name and the mapped
/// schema's short name drives the declaration; without one, the schema's own
/// short name serves as both. Wire names feed encode/decode, so this rule is
/// load-bearing for compatibility, not aesthetics.
#[must_use]
pub fn discriminator_case(mapping_key: Option<&str>, schema_short_name: &str) -> (String, String) {
  let wire = mapping_key.unwrap_or(schema_short_name).to_string();
  (wire, schema_short_name.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::naming::NamingStrategy;

  fn registry() -> NameRegistry {
    NameRegistry::new(NamingOptions::default())
  }

  #[test]
  fn type_names_are_memoized_per_component_key() {
    let mut registry = registry();
    let first = registry.type_name("Pet", ComponentKind::Schema);
    let second = registry.type_name("Pet", ComponentKind::Schema);

    assert_eq!(first, second);
    assert_eq!(first.safe_path(), "components::schemas::Pet");
  }

  #[test]
  fn same_key_different_kind_gets_its_own_name() {
    let mut registry = registry();
    let schema = registry.type_name("Limit", ComponentKind::Schema);
    let parameter = registry.type_name("Limit", ComponentKind::Parameter);

    assert_ne!(schema, parameter);
    assert_eq!(parameter.safe_path(), "components::parameters::Limit");
  }

  #[test]
  fn escaped_collision_is_detected_and_resolved() {
    let mut registry = NameRegistry::new(NamingOptions {
      strategy: NamingStrategy::Idiomatic,
      ..NamingOptions::default()
    });
    let first = registry.type_name("B$z", ComponentKind::Schema);
    let second = registry.type_name("B_dollar_z", ComponentKind::Schema);

    assert_eq!(first.short_name(), "BDollarZ");
    assert_eq!(second.short_name(), "BDollarZ_2");
    assert_ne!(first.safe_path(), second.safe_path());

    let notes = registry.drain_diagnostics();
    assert_eq!(notes.len(), 1);
  }

  #[test]
  fn conservative_strategy_keeps_clean_raw_names_verbatim() {
    let mut registry = registry();
    let tagged = registry.type_name("Pet_tag", ComponentKind::Schema);
    let cased = registry.type_name("PetTag", ComponentKind::Schema);

    assert_eq!(tagged.short_name(), "Pet_tag");
    assert_eq!(cased.short_name(), "PetTag");
    assert!(registry.drain_diagnostics().is_empty());
  }

  #[test]
  fn idiomatic_strategy_recases_and_suffixes_the_collision() {
    let mut registry = NameRegistry::new(NamingOptions {
      strategy: NamingStrategy::Idiomatic,
      ..NamingOptions::default()
    });
    let tagged = registry.type_name("Pet_tag", ComponentKind::Schema);
    let cased = registry.type_name("PetTag", ComponentKind::Schema);

    assert_eq!(tagged.short_name(), "PetTag");
    assert_eq!(cased.short_name(), "PetTag_2");
    assert_eq!(registry.drain_diagnostics().len(), 1);
  }

  #[test]
  fn collision_suffixes_count_upward() {
    let mut registry = registry();
    assert_eq!(registry.unique_name("Thing", "s").safe, "Thing");
    assert_eq!(registry.unique_name("Thing", "s").safe, "Thing_2");
    assert_eq!(registry.unique_name("Thing", "s").safe, "Thing_3");
  }

  #[test]
  fn scopes_do_not_interfere() {
    let mut registry = registry();
    assert_eq!(registry.unique_name("id", "a").safe, "id");
    assert_eq!(registry.unique_name("id", "b").safe, "id");
  }

  #[test]
  fn member_names_merge_keyword_escapes_with_collisions() {
    let mut registry = registry();
    assert_eq!(registry.member_name("type", "s").safe, "r#type");
    assert_eq!(registry.member_name("type", "s").safe, "r#type_2");
  }

  #[test]
  fn discriminator_case_prefers_mapping_key_for_wire_name() {
    let (wire, decl) = discriminator_case(Some("dog"), "Dog");
    assert_eq!(wire, "dog");
    assert_eq!(decl, "Dog");

    let (wire, decl) = discriminator_case(None, "Cat");
    assert_eq!(wire, "Cat");
    assert_eq!(decl, "Cat");
  }
}
