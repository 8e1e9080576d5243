//! Newline-delimited JSON bodies as lazy, single-pass sequences.

use std::{
  marker::PhantomData,
  pin::Pin,
  task::{Context, Poll},
};

use bytes::{Buf, Bytes, BytesMut};
use futures_core::Stream;
use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum JsonStreamError<E> {
  #[error("transport error while reading body: {0}")]
  Transport(E),

  #[error("JSON deserialization error at path {path}: {inner}")]
  JsonDeserialize { path: String, inner: serde_json::Error },
}

/// Decodes a byte stream of newline-delimited JSON into typed elements.
///
/// Forward-only: each line is decoded as it arrives and the underlying bytes
/// are released. Wrap in [`crate::StreamingBody::single_pass`] when handing to
/// retry-capable callers.
pub struct JsonLinesDecoder<T, S> {
  inner: Pin<Box<S>>,
  buffer: BytesMut,
  done: bool,
  _marker: PhantomData<T>,
}

impl<T, S> std::fmt::Debug for JsonLinesDecoder<T, S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JsonLinesDecoder")
      .field("buffered", &self.buffer.len())
      .finish_non_exhaustive()
  }
}

impl<T, S, E> JsonLinesDecoder<T, S>
where
  T: DeserializeOwned,
  S: Stream<Item = Result<Bytes, E>>,
{
  pub fn new(stream: S) -> Self {
    Self {
      inner: Box::pin(stream),
      buffer: BytesMut::new(),
      done: false,
      _marker: PhantomData,
    }
  }

  fn take_line(&mut self) -> Option<Bytes> {
    let newline = self.buffer.iter().position(|b| *b == b'\n')?;
    let line = self.buffer.split_to(newline).freeze();
    self.buffer.advance(1);
    Some(line)
  }

  fn decode(line: &[u8]) -> Result<T, JsonStreamError<E>> {
    let mut de = serde_json::Deserializer::from_slice(line);
    serde_path_to_error::deserialize(&mut de).map_err(|err| JsonStreamError::JsonDeserialize {
      path: err.path().to_string(),
      inner: err.into_inner(),
    })
  }
}

impl<T, S, E> Stream for JsonLinesDecoder<T, S>
where
  T: DeserializeOwned + Unpin,
  S: Stream<Item = Result<Bytes, E>>,
{
  type Item = Result<T, JsonStreamError<E>>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    loop {
      if let Some(line) = this.take_line() {
        if line.iter().all(u8::is_ascii_whitespace) {
          continue;
        }
        return Poll::Ready(Some(Self::decode(&line)));
      }

      if this.done {
        // Trailing element without a final newline.
        if this.buffer.iter().any(|b| !b.is_ascii_whitespace()) {
          let rest = std::mem::take(&mut this.buffer).freeze();
          return Poll::Ready(Some(Self::decode(&rest)));
        }
        return Poll::Ready(None);
      }

      match this.inner.as_mut().poll_next(cx) {
        Poll::Ready(Some(Ok(chunk))) => this.buffer.extend_from_slice(&chunk),
        Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(JsonStreamError::Transport(e)))),
        Poll::Ready(None) => this.done = true,
        Poll::Pending => return Poll::Pending,
      }
    }
  }
}

/// Encodes typed elements as newline-delimited JSON chunks on demand.
#[derive(Debug)]
pub struct JsonLinesEncoder<I> {
  items: I,
}

impl<I> JsonLinesEncoder<I> {
  pub fn new(items: I) -> Self {
    Self { items }
  }
}

impl<T, I> Iterator for JsonLinesEncoder<I>
where
  T: Serialize,
  I: Iterator<Item = T>,
{
  type Item = Result<Bytes, serde_json::Error>;

  fn next(&mut self) -> Option<Self::Item> {
    let item = self.items.next()?;
    Some(serde_json::to_vec(&item).map(|mut line| {
      line.push(b'\n');
      Bytes::from(line)
    }))
  }
}
