//! Hierarchical type names carrying both raw and safe forms.

use std::fmt;

/// One path component: the user-supplied name and its language-legal form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameComponent {
  pub raw: String,
  pub safe: String,
}

/// A fully qualified, hierarchical identifier such as
/// `components::schemas::Pet::Tag`.
///
/// Two distinct logical entities (distinct full raw paths) never share a safe
/// full path; the [`super::NameRegistry`] enforces that when it issues names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeName {
  components: Vec<NameComponent>,
}

impl TypeName {
  #[must_use]
  pub fn root(raw: impl Into<String>, safe: impl Into<String>) -> Self {
    Self {
      components: vec![NameComponent {
        raw: raw.into(),
        safe: safe.into(),
      }],
    }
  }

  #[must_use]
  pub fn child(&self, raw: impl Into<String>, safe: impl Into<String>) -> Self {
    let mut components = self.components.clone();
    components.push(NameComponent {
      raw: raw.into(),
      safe: safe.into(),
    });
    Self { components }
  }

  #[must_use]
  pub fn components(&self) -> &[NameComponent] {
    &self.components
  }

  /// The last safe component: the declaration's own identifier.
  #[must_use]
  pub fn short_name(&self) -> &str {
    self.components.last().map_or("", |c| c.safe.as_str())
  }

  #[must_use]
  pub fn raw_short_name(&self) -> &str {
    self.components.last().map_or("", |c| c.raw.as_str())
  }

  /// Safe components joined as a Rust path.
  #[must_use]
  pub fn safe_path(&self) -> String {
    self
      .components
      .iter()
      .map(|c| c.safe.as_str())
      .collect::<Vec<_>>()
      .join("::")
  }

  /// Raw components joined for diagnostics and memo keys.
  #[must_use]
  pub fn raw_path(&self) -> String {
    self
      .components
      .iter()
      .map(|c| c.raw.as_str())
      .collect::<Vec<_>>()
      .join("/")
  }

  /// Scope identifier for siblings of this name: the safe path of its parent.
  #[must_use]
  pub fn parent_scope(&self) -> String {
    let len = self.components.len().saturating_sub(1);
    self.components[..len]
      .iter()
      .map(|c| c.safe.as_str())
      .collect::<Vec<_>>()
      .join("::")
  }
}

impl fmt::Display for TypeName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.safe_path())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paths_join_raw_and_safe_forms() {
    let name = TypeName::root("components", "components")
      .child("schemas", "schemas")
      .child("B$z", "BDollarZ");

    assert_eq!(name.safe_path(), "components::schemas::BDollarZ");
    assert_eq!(name.raw_path(), "components/schemas/B$z");
    assert_eq!(name.short_name(), "BDollarZ");
    assert_eq!(name.raw_short_name(), "B$z");
    assert_eq!(name.parent_scope(), "components::schemas");
  }
}
