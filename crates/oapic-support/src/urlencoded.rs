//! `application/x-www-form-urlencoded` bodies for generated clients and
//! servers.
//!
//! Serialization goes through `serde_json::Value` so any `Serialize` type
//! with an object shape can ride a form body without a dedicated codec.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

/// Everything outside the `application/x-www-form-urlencoded` safe set.
const FORM: &AsciiSet = &CONTROLS
  .add(b' ')
  .add(b'!')
  .add(b'"')
  .add(b'#')
  .add(b'$')
  .add(b'%')
  .add(b'&')
  .add(b'\'')
  .add(b'(')
  .add(b')')
  .add(b'+')
  .add(b',')
  .add(b'/')
  .add(b':')
  .add(b';')
  .add(b'=')
  .add(b'?')
  .add(b'@')
  .add(b'[')
  .add(b']');

#[derive(Debug, thiserror::Error)]
pub enum UrlEncodedError {
  #[error("value is not an object and cannot become a form body")]
  NotAnObject,

  #[error("serialization failed: {0}")]
  Serialize(#[from] serde_json::Error),
}

fn scalar_text(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Encodes an object-shaped value as a form body. Null properties are
/// omitted; array properties repeat the key once per element.
pub fn encode<T: Serialize>(value: &T) -> Result<String, UrlEncodedError> {
  let value = serde_json::to_value(value)?;
  let serde_json::Value::Object(entries) = value else {
    return Err(UrlEncodedError::NotAnObject);
  };

  let mut pairs: Vec<String> = Vec::new();
  for (key, value) in &entries {
    let key = utf8_percent_encode(key, FORM).to_string();
    match value {
      serde_json::Value::Null => {}
      serde_json::Value::Array(items) => {
        for item in items {
          pairs.push(format!("{key}={}", utf8_percent_encode(&scalar_text(item), FORM)));
        }
      }
      other => pairs.push(format!("{key}={}", utf8_percent_encode(&scalar_text(other), FORM))),
    }
  }
  Ok(pairs.join("&"))
}

/// Decodes a form body into an object of strings. Repeated keys collect
/// into an array, matching how [`encode`] writes array properties.
#[must_use]
pub fn decode(text: &str) -> serde_json::Map<String, serde_json::Value> {
  let mut entries = serde_json::Map::new();
  for pair in text.split('&').filter(|p| !p.is_empty()) {
    let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
    let key = percent_decode_str(raw_key).decode_utf8_lossy().into_owned();
    let value = percent_decode_str(&raw_value.replace('+', " ")).decode_utf8_lossy().into_owned();

    match entries.get_mut(&key) {
      Some(serde_json::Value::Array(items)) => items.push(serde_json::Value::String(value)),
      Some(existing) => {
        let first = existing.take();
        *existing = serde_json::Value::Array(vec![first, serde_json::Value::String(value)]);
      }
      None => {
        entries.insert(key, serde_json::Value::String(value));
      }
    }
  }
  entries
}

/// First value decoded for a key, if any.
#[must_use]
pub fn value(entries: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
  match entries.get(key)? {
    serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
    other => other.as_str().map(str::to_string),
  }
}

/// Every value decoded for a key, flattened to strings.
#[must_use]
pub fn values(entries: &serde_json::Map<String, serde_json::Value>, key: &str) -> Vec<String> {
  match entries.get(key) {
    Some(serde_json::Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect(),
    Some(other) => other.as_str().map(str::to_string).into_iter().collect(),
    None => Vec::new(),
  }
}
