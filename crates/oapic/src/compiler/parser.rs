//! Raw document bytes → validated-version `oas3::Spec`.
//!
//! The version gate runs before full decoding so a `3.2.0` document fails
//! with a precise "unsupported version" error instead of a decode error
//! somewhere deep in the tree.

use std::{ffi::OsStr, path::Path};

use oas3::OpenApiV3Spec;

/// Supported `major.minor` version families.
const SUPPORTED_VERSION_FAMILIES: &[&str] = &["3.0", "3.1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
  #[default]
  Json,
  Yaml,
}

impl DocumentFormat {
  #[must_use]
  pub fn from_extension(ext: &str) -> Self {
    match ext {
      "yaml" | "yml" => Self::Yaml,
      _ => Self::Json,
    }
  }

  #[must_use]
  pub fn from_path(path: &Path) -> Self {
    path
      .extension()
      .and_then(OsStr::to_str)
      .map_or(Self::default(), Self::from_extension)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("malformed document at line {line}, column {column}: {detail}")]
  Syntax {
    line: usize,
    column: usize,
    detail: String,
  },

  #[error("malformed document: {detail}")]
  SyntaxUnlocated { detail: String },

  #[error("document has no 'openapi' version key")]
  MissingVersionKey,

  #[error("unsupported OpenAPI version '{found}' (supported: 3.0.x, 3.1.x)")]
  UnsupportedVersion { found: String },

  #[error("document failed to decode at '{path}': {detail}")]
  Decode { path: String, detail: String },

  #[error("document is not valid UTF-8")]
  InvalidUtf8(#[from] std::str::Utf8Error),
}

/// A parsed, version-checked document ready for validation.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
  pub spec: oas3::Spec,
  pub version: String,
  pub format: DocumentFormat,
  pub source_path: Option<String>,
}

/// Parses raw bytes into a [`ParsedDocument`].
///
/// # Errors
///
/// Fails on malformed syntax (with line/column where the underlying scanner
/// provides one), a missing `openapi` key, an unsupported version, or a
/// structurally undecodable tree (with the offending serde path).
pub fn parse(bytes: &[u8], format: DocumentFormat) -> Result<ParsedDocument, ParseError> {
  let value = decode_value(bytes, format)?;
  let version = check_version(&value)?;
  let spec = decode_spec(value)?;

  Ok(ParsedDocument {
    spec,
    version,
    format,
    source_path: None,
  })
}

fn decode_value(bytes: &[u8], format: DocumentFormat) -> Result<serde_json::Value, ParseError> {
  match format {
    DocumentFormat::Json => serde_json::from_slice(bytes).map_err(|e| {
      if e.is_syntax() || e.is_eof() {
        ParseError::Syntax {
          line: e.line(),
          column: e.column(),
          detail: e.to_string(),
        }
      } else {
        ParseError::SyntaxUnlocated { detail: e.to_string() }
      }
    }),
    DocumentFormat::Yaml => {
      let text = std::str::from_utf8(bytes)?;
      serde_yaml::from_str(text).map_err(|e| match e.location() {
        Some(location) => ParseError::Syntax {
          line: location.line(),
          column: location.column(),
          detail: e.to_string(),
        },
        None => ParseError::SyntaxUnlocated { detail: e.to_string() },
      })
    }
  }
}

fn check_version(value: &serde_json::Value) -> Result<String, ParseError> {
  let found = value
    .get("openapi")
    .and_then(serde_json::Value::as_str)
    .ok_or(ParseError::MissingVersionKey)?;

  let supported = SUPPORTED_VERSION_FAMILIES
    .iter()
    .any(|family| found.starts_with(&format!("{family}.")) || found == *family);

  if supported {
    Ok(found.to_string())
  } else {
    Err(ParseError::UnsupportedVersion { found: found.to_string() })
  }
}

fn decode_spec(value: serde_json::Value) -> Result<OpenApiV3Spec, ParseError> {
  serde_path_to_error::deserialize(value).map_err(|err| ParseError::Decode {
    path: err.path().to_string(),
    detail: err.into_inner().to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"{
    "openapi": "3.0.3",
    "info": { "title": "Minimal", "version": "1.0.0" },
    "paths": {}
  }"#;

  #[test]
  fn parses_minimal_json_document() {
    let parsed = parse(MINIMAL.as_bytes(), DocumentFormat::Json).unwrap();
    assert_eq!(parsed.version, "3.0.3");
    assert_eq!(parsed.spec.info.title, "Minimal");
  }

  #[test]
  fn parses_minimal_yaml_document() {
    let yaml = "openapi: \"3.1.0\"\ninfo:\n  title: Minimal\n  version: \"1.0.0\"\npaths: {}\n";
    let parsed = parse(yaml.as_bytes(), DocumentFormat::Yaml).unwrap();
    assert_eq!(parsed.version, "3.1.0");
  }

  #[test]
  fn rejects_missing_version_key() {
    let doc = r#"{ "info": { "title": "x", "version": "1" }, "paths": {} }"#;
    let err = parse(doc.as_bytes(), DocumentFormat::Json).unwrap_err();
    assert!(matches!(err, ParseError::MissingVersionKey));
  }

  #[test]
  fn rejects_unsupported_version_naming_it() {
    let doc = r#"{ "openapi": "3.2.0", "info": { "title": "x", "version": "1" }, "paths": {} }"#;
    let err = parse(doc.as_bytes(), DocumentFormat::Json).unwrap_err();
    match err {
      ParseError::UnsupportedVersion { found } => assert_eq!(found, "3.2.0"),
      other => panic!("expected UnsupportedVersion, got {other}"),
    }
  }

  #[test]
  fn rejects_swagger_two() {
    let doc = r#"{ "swagger": "2.0", "info": { "title": "x", "version": "1" }, "paths": {} }"#;
    let err = parse(doc.as_bytes(), DocumentFormat::Json).unwrap_err();
    assert!(matches!(err, ParseError::MissingVersionKey));
  }

  #[test]
  fn malformed_json_reports_line_and_column() {
    let doc = "{\n  \"openapi\": \"3.0.0\",\n  oops\n}";
    let err = parse(doc.as_bytes(), DocumentFormat::Json).unwrap_err();
    match err {
      ParseError::Syntax { line, column, .. } => {
        assert_eq!(line, 3);
        assert!(column > 0);
      }
      other => panic!("expected Syntax, got {other}"),
    }
  }

  #[test]
  fn malformed_yaml_reports_location() {
    let doc = "openapi: \"3.0.0\"\ninfo: [\n";
    let err = parse(doc.as_bytes(), DocumentFormat::Yaml).unwrap_err();
    assert!(matches!(err, ParseError::Syntax { .. } | ParseError::SyntaxUnlocated { .. }));
  }

  #[test]
  fn undecodable_tree_reports_serde_path() {
    let doc = r#"{
      "openapi": "3.0.0",
      "info": { "title": "x", "version": "1.0" },
      "paths": { "/a": { "get": { "responses": "not-an-object" } } }
    }"#;
    let err = parse(doc.as_bytes(), DocumentFormat::Json).unwrap_err();
    match err {
      ParseError::Decode { path, .. } => assert!(path.contains("paths"), "path was {path}"),
      other => panic!("expected Decode, got {other}"),
    }
  }

  #[test]
  fn format_detection_from_extension() {
    assert_eq!(DocumentFormat::from_extension("yaml"), DocumentFormat::Yaml);
    assert_eq!(DocumentFormat::from_extension("yml"), DocumentFormat::Yaml);
    assert_eq!(DocumentFormat::from_extension("json"), DocumentFormat::Json);
    assert_eq!(DocumentFormat::from_path(Path::new("api.yml")), DocumentFormat::Yaml);
  }
}
