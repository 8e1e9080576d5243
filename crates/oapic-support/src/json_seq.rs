//! RFC 7464 JSON text sequences (`application/json-seq`) as lazy sequences.
//!
//! Each record is `RS (0x1E) <json> LF`. Decoding tolerates missing leading
//! separators on the first record, which some producers omit.

use std::{
  marker::PhantomData,
  pin::Pin,
  task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use serde::{Serialize, de::DeserializeOwned};

use crate::json_lines::JsonStreamError;

const RECORD_SEPARATOR: u8 = 0x1E;

/// Decodes an `application/json-seq` byte stream into typed elements.
pub struct JsonSeqDecoder<T, S> {
  inner: Pin<Box<S>>,
  buffer: BytesMut,
  done: bool,
  _marker: PhantomData<T>,
}

impl<T, S> std::fmt::Debug for JsonSeqDecoder<T, S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JsonSeqDecoder")
      .field("buffered", &self.buffer.len())
      .finish_non_exhaustive()
  }
}

impl<T, S, E> JsonSeqDecoder<T, S>
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

  /// Extracts the next complete record payload, stripping separators.
  fn take_record(&mut self) -> Option<Bytes> {
    while self.buffer.first() == Some(&RECORD_SEPARATOR) {
      let _ = self.buffer.split_to(1);
    }
    let end = self
      .buffer
      .iter()
      .position(|b| *b == b'\n' || *b == RECORD_SEPARATOR)?;
    let record = self.buffer.split_to(end).freeze();
    if self.buffer.first() == Some(&b'\n') {
      let _ = self.buffer.split_to(1);
    }
    Some(record)
  }

  fn decode(record: &[u8]) -> Result<T, JsonStreamError<E>> {
    let mut de = serde_json::Deserializer::from_slice(record);
    serde_path_to_error::deserialize(&mut de).map_err(|err| JsonStreamError::JsonDeserialize {
      path: err.path().to_string(),
      inner: err.into_inner(),
    })
  }
}

impl<T, S, E> Stream for JsonSeqDecoder<T, S>
where
  T: DeserializeOwned + Unpin,
  S: Stream<Item = Result<Bytes, E>>,
{
  type Item = Result<T, JsonStreamError<E>>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    loop {
      if let Some(record) = this.take_record() {
        if record.iter().all(u8::is_ascii_whitespace) {
          continue;
        }
        return Poll::Ready(Some(Self::decode(&record)));
      }

      if this.done {
        if this.buffer.iter().any(|b| !b.is_ascii_whitespace() && *b != RECORD_SEPARATOR) {
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

/// Encodes typed elements as RFC 7464 records on demand.
#[derive(Debug)]
pub struct JsonSeqEncoder<I> {
  items: I,
}

impl<I> JsonSeqEncoder<I> {
  pub fn new(items: I) -> Self {
    Self { items }
  }
}

impl<T, I> Iterator for JsonSeqEncoder<I>
where
  T: Serialize,
  I: Iterator<Item = T>,
{
  type Item = Result<Bytes, serde_json::Error>;

  fn next(&mut self) -> Option<Self::Item> {
    let item = self.items.next()?;
    Some(serde_json::to_vec(&item).map(|payload| {
      let mut record = Vec::with_capacity(payload.len() + 2);
      record.push(RECORD_SEPARATOR);
      record.extend_from_slice(&payload);
      record.push(b'\n');
      Bytes::from(record)
    }))
  }
}

#[cfg(test)]
mod tests {
  use futures::StreamExt;

  use super::*;

  #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
  struct Tick {
    seq: u64,
  }

  fn stream_of(bytes: &'static [u8]) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
    futures::stream::iter(vec![Ok(Bytes::from_static(bytes))])
  }

  #[tokio::test]
  async fn decodes_separated_records() {
    let decoder = JsonSeqDecoder::<Tick, _>::new(stream_of(b"\x1e{\"seq\":1}\n\x1e{\"seq\":2}\n"));
    let ticks: Vec<Tick> = decoder.map(Result::unwrap).collect().await;

    assert_eq!(ticks, vec![Tick { seq: 1 }, Tick { seq: 2 }]);
  }

  #[tokio::test]
  async fn tolerates_missing_leading_separator() {
    let decoder = JsonSeqDecoder::<Tick, _>::new(stream_of(b"{\"seq\":5}\n"));
    let ticks: Vec<Tick> = decoder.map(Result::unwrap).collect().await;

    assert_eq!(ticks, vec![Tick { seq: 5 }]);
  }

  #[test]
  fn encode_then_decode_round_trips() {
    let encoded: Vec<u8> = JsonSeqEncoder::new(vec![Tick { seq: 9 }].into_iter())
      .map(Result::unwrap)
      .flatten()
      .collect();

    assert_eq!(encoded.first(), Some(&RECORD_SEPARATOR));
    assert_eq!(encoded.last(), Some(&b'\n'));

    let body: &'static [u8] = Box::leak(encoded.into_boxed_slice());
    let decoder = JsonSeqDecoder::<Tick, _>::new(futures::stream::iter(vec![Ok::<_, std::convert::Infallible>(
      Bytes::from_static(body),
    )]));
    let ticks: Vec<Tick> = futures::executor::block_on(decoder.map(Result::unwrap).collect::<Vec<_>>());
    assert_eq!(ticks, vec![Tick { seq: 9 }]);
  }
}
