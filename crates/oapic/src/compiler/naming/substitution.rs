//! Versioned special-character substitution table.
//!
//! Escaping a character to a descriptive token keeps generated identifiers
//! visually traceable to the source name (`B$z` → `B_dollar_z`). The table is
//! data, not code, so a future revision can change tokens without silently
//! renaming identifiers produced by the current one: callers pin a version.

/// One table revision mapping characters to identifier-safe tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionTable {
  pub version: u32,
  entries: &'static [(char, &'static str)],
}

const V1_ENTRIES: &[(char, &str)] = &[
  ('$', "dollar"),
  ('#', "hash"),
  ('%', "percent"),
  ('&', "and"),
  ('*', "star"),
  ('+', "plus"),
  ('@', "at"),
  ('^', "caret"),
  ('|', "pipe"),
  ('~', "tilde"),
  ('!', "bang"),
  ('=', "equals"),
  ('<', "lt"),
  ('>', "gt"),
  ('/', "slash"),
  ('\\', "backslash"),
  ('?', "question"),
];

impl SubstitutionTable {
  #[must_use]
  pub fn v1() -> Self {
    Self {
      version: 1,
      entries: V1_ENTRIES,
    }
  }

  /// Token for `c`, or `None` when the character has no named substitution
  /// and should fall back to a plain separator.
  #[must_use]
  pub fn token_for(&self, c: char) -> Option<&'static str> {
    self
      .entries
      .iter()
      .find_map(|(entry, token)| (*entry == c).then_some(*token))
  }
}

impl Default for SubstitutionTable {
  fn default() -> Self {
    Self::v1()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn v1_names_common_symbols() {
    let table = SubstitutionTable::v1();
    assert_eq!(table.token_for('$'), Some("dollar"));
    assert_eq!(table.token_for('@'), Some("at"));
    assert_eq!(table.token_for('x'), None);
  }
}
