//! Raw OpenAPI names → language-legal Rust identifiers.

use std::{collections::HashSet, sync::LazyLock};

use any_ascii::any_ascii;
use inflections::Inflect;
use regex::Regex;

use super::{NamingStrategy, substitution::SubstitutionTable};

pub(crate) static FORBIDDEN_IDENTIFIERS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
  [
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn", "for", "if", "impl", "in",
    "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "async", "await", "dyn", "try", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "gen", "self", "Self",
  ]
  .into_iter()
  .collect()
});

static RESERVED_PASCAL_CASE: LazyLock<HashSet<&str>> = LazyLock::new(|| {
  ["Clone", "Copy", "Display", "Self", "Send", "Sync", "Type", "Vec", "Option", "Result", "Box"]
    .into_iter()
    .collect()
});

static INVALID_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());
static MULTI_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Base sanitization: transliterate to ASCII, substitute table-named symbols
/// with their tokens, replace everything else invalid with underscores,
/// collapse runs, trim the ends.
pub(crate) fn sanitize(input: &str, table: &SubstitutionTable) -> String {
  if input.is_empty() {
    return String::new();
  }

  let mut substituted = String::with_capacity(input.len());
  for c in input.chars() {
    match table.token_for(c) {
      Some(token) => {
        substituted.push('_');
        substituted.push_str(token);
        substituted.push('_');
      }
      None => substituted.push(c),
    }
  }

  let ascii = any_ascii(&substituted);
  let replaced = INVALID_CHARS_RE.replace_all(&ascii, "_");
  let collapsed = MULTI_UNDERSCORE_RE.replace_all(&replaced, "_");

  collapsed.trim_matches('_').to_string()
}

/// Converts a raw name into a `PascalCase` type identifier.
pub(crate) fn to_type_ident(name: &str, table: &SubstitutionTable) -> String {
  let mut ident = sanitize(name, table).to_pascal_case();

  if ident.is_empty() {
    return "Unnamed".to_string();
  }

  // `Self` cannot be a raw identifier, so all clashes take a suffix.
  if RESERVED_PASCAL_CASE.contains(ident.as_str()) {
    return format!("{ident}Type");
  }

  if ident.starts_with(|c: char| c.is_ascii_digit()) {
    ident.insert(0, 'T');
  }

  ident
}

/// Strategy-aware type identifier derivation.
///
/// Conservative keeps a raw name verbatim when it is already a legal type
/// identifier, so `Pet_tag` and `PetTag` stay distinct declarations.
/// Idiomatic always recases, which can collide two such raw names; the
/// registry then resolves the collision with a numeric suffix.
pub(crate) fn to_type_ident_with(name: &str, strategy: NamingStrategy, table: &SubstitutionTable) -> String {
  if strategy == NamingStrategy::Conservative
    && is_clean_type_ident(name)
    && !RESERVED_PASCAL_CASE.contains(name)
  {
    return name.to_string();
  }
  to_type_ident(name, table)
}

fn is_clean_type_ident(name: &str) -> bool {
  let mut chars = name.chars();
  chars.next().is_some_and(|c| c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Converts a raw name into a `snake_case` member identifier.
pub(crate) fn to_member_ident(name: &str, table: &SubstitutionTable) -> String {
  let mut ident = sanitize(name, table).to_snake_case();

  if ident.is_empty() {
    return "_".to_string();
  }

  if ident == "self" {
    return "self_".to_string();
  }

  if FORBIDDEN_IDENTIFIERS.contains(ident.as_str()) {
    return format!("r#{ident}");
  }

  if ident.starts_with(|c: char| c.is_ascii_digit()) {
    ident.insert(0, '_');
  }

  ident
}

/// Derives an enum case identifier from a raw wire value.
///
/// Values that cannot begin an identifier get a leading underscore form that
/// keeps the value readable: `-1` → `_n1`, `""` → `_empty`, `2.5` → `_2_5`.
/// The raw wire value is preserved elsewhere for encode/decode.
pub(crate) fn to_case_ident(raw_value: &str, table: &SubstitutionTable) -> String {
  if raw_value.is_empty() {
    return "_empty".to_string();
  }

  if let Some(rest) = raw_value.strip_prefix('-')
    && rest.chars().next().is_some_and(|c| c.is_ascii_digit())
  {
    let cleaned = sanitize(rest, table);
    return format!("_n{cleaned}");
  }

  let mut ident = sanitize(raw_value, table).to_pascal_case();

  if ident.is_empty() {
    return "_empty".to_string();
  }

  if ident.starts_with(|c: char| c.is_ascii_digit()) {
    ident.insert(0, '_');
  }

  if RESERVED_PASCAL_CASE.contains(ident.as_str()) {
    return format!("{ident}Value");
  }

  ident
}
