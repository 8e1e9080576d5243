//! Serde adapter for fields that are both optional and nullable.
//!
//! `Option<Option<T>>` under a plain derive collapses `null` and absent into
//! the same value. Routing the field through this module keeps them apart:
//! absent stays `None` (via `#[serde(default)]`), an explicit `null` becomes
//! `Some(None)`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
  T: Serialize,
  S: Serializer,
{
  match value {
    Some(inner) => inner.serialize(serializer),
    None => serializer.serialize_none(),
  }
}
