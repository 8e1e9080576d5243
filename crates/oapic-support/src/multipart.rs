//! `multipart/form-data` assembly and parsing for generated code.
//!
//! The boundary is derived from the part contents and extended until it
//! collides with nothing in the payload, so encoding needs no entropy
//! source and stays deterministic for identical inputs.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
  pub name: String,
  pub content_type: Option<String>,
  /// Extra part headers beyond disposition and content type.
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Part {
  #[must_use]
  pub fn new(name: impl Into<String>, body: Vec<u8>) -> Self {
    Self {
      name: name.into(),
      content_type: None,
      headers: Vec::new(),
      body,
    }
  }

  #[must_use]
  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }

  #[must_use]
  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
  #[error("body does not start with the boundary delimiter")]
  MissingBoundary,

  #[error("part is missing a Content-Disposition name")]
  UnnamedPart,

  #[error("part headers are not valid UTF-8")]
  HeaderEncoding,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
  haystack.windows(needle.len()).any(|window| window == needle)
}

fn derive_boundary(parts: &[Part]) -> String {
  // FNV-1a over part contents keeps identical payloads byte-identical.
  let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
  for part in parts {
    for byte in part.name.bytes().chain(part.body.iter().copied()) {
      hash ^= u64::from(byte);
      hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
  }

  let mut boundary = format!("form-boundary-{hash:016x}");
  while parts.iter().any(|part| contains(&part.body, boundary.as_bytes())) {
    boundary.push('b');
  }
  boundary
}

/// Encodes parts into a body, returning the boundary to place in the
/// `Content-Type` header and the framed bytes.
#[must_use]
pub fn encode(parts: &[Part]) -> (String, Vec<u8>) {
  let boundary = derive_boundary(parts);
  let mut body = Vec::new();

  for part in parts {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes());
    if let Some(content_type) = &part.content_type {
      body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    for (name, value) in &part.headers {
      body.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(&part.body);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

  (boundary, body)
}

fn parse_part(block: &[u8]) -> Result<Part, MultipartError> {
  let split = block
    .windows(4)
    .position(|w| w == b"\r\n\r\n")
    .ok_or(MultipartError::UnnamedPart)?;
  let header_text = std::str::from_utf8(&block[..split]).map_err(|_| MultipartError::HeaderEncoding)?;
  let body = block[split + 4..].to_vec();

  let mut part = Part::new(String::new(), body);
  for line in header_text.split("\r\n").filter(|l| !l.is_empty()) {
    let (name, value) = line.split_once(':').ok_or(MultipartError::HeaderEncoding)?;
    let value = value.trim();
    if name.eq_ignore_ascii_case("content-disposition") {
      part.name = value
        .split(';')
        .filter_map(|attr| attr.trim().strip_prefix("name="))
        .map(|n| n.trim_matches('"').to_string())
        .next()
        .ok_or(MultipartError::UnnamedPart)?;
    } else if name.eq_ignore_ascii_case("content-type") {
      part.content_type = Some(value.to_string());
    } else {
      part.headers.push((name.to_string(), value.to_string()));
    }
  }

  if part.name.is_empty() {
    return Err(MultipartError::UnnamedPart);
  }
  Ok(part)
}

/// Parses a body framed with the given boundary back into parts.
pub fn decode(boundary: &str, body: &[u8]) -> Result<Vec<Part>, MultipartError> {
  let delimiter = format!("--{boundary}");
  let text_start = delimiter.as_bytes();
  if !body.starts_with(text_start) {
    return Err(MultipartError::MissingBoundary);
  }

  let mut parts = Vec::new();
  let mut rest = &body[text_start.len()..];
  loop {
    if rest.starts_with(b"--") {
      break;
    }
    let rest_after = rest.strip_prefix(b"\r\n").unwrap_or(rest);
    let end = rest_after
      .windows(text_start.len())
      .position(|w| w == text_start)
      .ok_or(MultipartError::MissingBoundary)?;
    let block = &rest_after[..end];
    let block = block.strip_suffix(b"\r\n").unwrap_or(block);
    parts.push(parse_part(block)?);
    rest = &rest_after[end + text_start.len()..];
  }
  Ok(parts)
}
