//! Accept-header media range parsing and quality ordering.
//!
//! Servers negotiate a response content type by sorting the client's media
//! ranges by descending quality, breaking ties by declaration order, and
//! picking the first range that matches a documented content type.

use std::str::FromStr;

use mediatype::{MediaTypeBuf, ReadParams};

/// One media range from an `Accept` header value.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
  pub media_type: MediaTypeBuf,
  /// Quality value in `0.0..=1.0`; absent `q` parameters default to 1.0.
  pub quality: f32,
  /// Position within the original header, used as the tie-breaker.
  pub index: usize,
}

impl MediaRange {
  /// Returns true when this range matches the given concrete content type,
  /// honoring `*/*` and `type/*` wildcards.
  #[must_use]
  pub fn matches(&self, content_type: &MediaTypeBuf) -> bool {
    let ty = self.media_type.ty();
    let subty = self.media_type.subty();
    (ty.as_str() == "*" || ty == content_type.ty()) && (subty.as_str() == "*" || subty == content_type.subty())
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MediaRangeError {
  #[error("invalid media range '{range}'")]
  InvalidRange { range: String },
}

/// Parses a full `Accept` header value into its media ranges.
///
/// Unparseable segments are skipped rather than failing the whole header:
/// a sloppy client must not make negotiation impossible.
#[must_use]
pub fn parse_accept_header(value: &str) -> Vec<MediaRange> {
  value
    .split(',')
    .map(str::trim)
    .filter(|segment| !segment.is_empty())
    .filter_map(parse_range)
    .enumerate()
    .map(|(index, (media_type, quality))| MediaRange {
      media_type,
      quality,
      index,
    })
    .collect()
}

fn parse_range(segment: &str) -> Option<(MediaTypeBuf, f32)> {
  let media_type = MediaTypeBuf::from_str(segment).ok()?;
  let quality = mediatype::Name::new("q")
    .and_then(|name| media_type.get_param(name))
    .and_then(|v| v.as_str().parse::<f32>().ok())
    .map_or(1.0, |q| q.clamp(0.0, 1.0));
  Some((media_type, quality))
}

/// Sorts media ranges by descending quality, ties broken by declaration order.
pub fn sort_by_quality(ranges: &mut [MediaRange]) {
  ranges.sort_by(|a, b| {
    b.quality
      .partial_cmp(&a.quality)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then(a.index.cmp(&b.index))
  });
}

/// Picks the documented content type the sorted ranges prefer.
///
/// Falls back to the first documented type when the header is empty or no
/// range matches anything documented.
#[must_use]
pub fn negotiate<'a>(ranges: &[MediaRange], documented: &'a [MediaTypeBuf]) -> Option<&'a MediaTypeBuf> {
  let mut sorted = ranges.to_vec();
  sort_by_quality(&mut sorted);

  sorted
    .iter()
    .find_map(|range| documented.iter().find(|ct| range.matches(ct)))
    .or_else(|| documented.first())
}

/// Negotiates over raw header and content-type strings.
///
/// Generated routers hold their documented content types as string
/// literals, so this front end parses both sides and hands back the
/// winning literal. Documented entries that fail to parse are skipped;
/// the fallback is still the first documented entry.
#[must_use]
pub fn negotiate_header<'a>(accept: Option<&str>, documented: &[&'a str]) -> Option<&'a str> {
  if documented.is_empty() {
    return None;
  }
  let parsed: Vec<(usize, MediaTypeBuf)> = documented
    .iter()
    .enumerate()
    .filter_map(|(index, raw)| MediaTypeBuf::from_str(raw).ok().map(|ct| (index, ct)))
    .collect();
  let mut ranges = parse_accept_header(accept.unwrap_or(""));
  sort_by_quality(&mut ranges);

  let winner = ranges
    .iter()
    .find_map(|range| parsed.iter().find(|(_, ct)| range.matches(ct)).map(|(index, _)| *index))
    .unwrap_or(0);
  Some(documented[winner])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn media(s: &str) -> MediaTypeBuf {
    MediaTypeBuf::from_str(s).unwrap()
  }

  #[test]
  fn implicit_quality_sorts_first() {
    let mut ranges = parse_accept_header("application/json; q=0.8, text/plain");
    sort_by_quality(&mut ranges);

    assert_eq!(ranges[0].media_type.essence(), media("text/plain").essence());
    assert_eq!(ranges[1].media_type.essence(), media("application/json").essence());
  }

  #[test]
  fn equal_quality_preserves_declaration_order() {
    let mut ranges = parse_accept_header("text/html, application/json, text/plain");
    sort_by_quality(&mut ranges);

    let order: Vec<_> = ranges.iter().map(|r| r.index).collect();
    assert_eq!(order, vec![0, 1, 2]);
  }

  #[test]
  fn wildcard_ranges_match_documented_types() {
    let ranges = parse_accept_header("image/*, */*; q=0.1");
    let documented = vec![media("application/json"), media("image/png")];

    let chosen = negotiate(&ranges, &documented).unwrap();
    assert_eq!(chosen.essence(), media("image/png").essence());
  }

  #[test]
  fn no_match_falls_back_to_first_documented() {
    let ranges = parse_accept_header("audio/ogg");
    let documented = vec![media("application/json"), media("text/plain")];

    let chosen = negotiate(&ranges, &documented).unwrap();
    assert_eq!(chosen.essence(), media("application/json").essence());
  }

  #[test]
  fn empty_header_falls_back_to_first_documented() {
    let documented = vec![media("text/event-stream")];
    let chosen = negotiate(&[], &documented).unwrap();
    assert_eq!(chosen.essence(), media("text/event-stream").essence());
  }

  #[test]
  fn header_front_end_prefers_the_highest_quality_documented_type() {
    let accept = Some("application/json; q=0.4, text/plain");
    let chosen = negotiate_header(accept, &["application/json", "text/plain"]);
    assert_eq!(chosen, Some("text/plain"));
  }

  #[test]
  fn header_front_end_missing_header_picks_the_first_documented_type() {
    let chosen = negotiate_header(None, &["application/json", "text/plain"]);
    assert_eq!(chosen, Some("application/json"));
  }

  #[test]
  fn header_front_end_with_nothing_documented_yields_none() {
    assert_eq!(negotiate_header(Some("*/*"), &[]), None);
  }

  #[test]
  fn malformed_segments_are_skipped() {
    let ranges = parse_accept_header("not a type,,application/json");
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].media_type.essence(), media("application/json").essence());
  }
}
