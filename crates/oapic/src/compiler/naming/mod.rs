//! Identifier assignment: sanitization, hierarchical type names, and the
//! per-run collision registry.

pub(crate) mod identifiers;
mod registry;
mod substitution;
mod type_name;

pub use registry::{ComponentKind, IssuedName, NameRegistry, discriminator_case};
pub use substitution::SubstitutionTable;
pub use type_name::{NameComponent, TypeName};

/// How aggressively raw names are reshaped into idiomatic Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStrategy {
  /// Keep close to the source name; never merge case variants.
  #[default]
  Conservative,
  /// Prefer idiomatic casing even when two raw names may then collide
  /// (collisions still resolve via numeric suffixes).
  Idiomatic,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamingOptions {
  pub strategy: NamingStrategy,
  pub table: SubstitutionTable,
}
