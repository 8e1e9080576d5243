//! Server-sent event bodies decoded as typed, single-pass sequences.

use std::{
  marker::PhantomData,
  pin::Pin,
  task::{Context, Poll},
};

use eventsource_stream::Eventsource;
use futures_core::Stream;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum EventStreamError<E> {
  #[error("SSE parse error: {0}")]
  SseParse(#[from] eventsource_stream::EventStreamError<E>),

  #[error("JSON deserialization error at path {path}: {inner}")]
  JsonDeserialize { path: String, inner: serde_json::Error },
}

/// A stream of server-sent events whose `data` fields decode as JSON `T`.
///
/// Works over any byte stream; the transport layer supplies the chunks, this
/// type owns SSE framing and JSON decoding. Frames with empty data (keepalive
/// comments) are skipped.
pub struct EventStream<T, S>
where
  S: Stream,
{
  inner: Pin<Box<eventsource_stream::EventStream<S>>>,
  _marker: PhantomData<T>,
}

impl<T, S: Stream> std::fmt::Debug for EventStream<T, S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventStream").finish_non_exhaustive()
  }
}

impl<T, S, B, E> EventStream<T, S>
where
  T: DeserializeOwned,
  S: Stream<Item = Result<B, E>>,
  B: AsRef<[u8]>,
{
  /// Wraps a chunked byte stream carrying `text/event-stream` frames.
  #[must_use]
  pub fn new(byte_stream: S) -> Self {
    Self {
      inner: Box::pin(byte_stream.eventsource()),
      _marker: PhantomData,
    }
  }

  fn parse_event(data: &str) -> Result<T, EventStreamError<E>> {
    let mut de = serde_json::Deserializer::from_str(data);
    serde_path_to_error::deserialize(&mut de).map_err(|err| EventStreamError::JsonDeserialize {
      path: err.path().to_string(),
      inner: err.into_inner(),
    })
  }
}

impl<T, S, B, E> Stream for EventStream<T, S>
where
  T: DeserializeOwned + Unpin,
  S: Stream<Item = Result<B, E>>,
  B: AsRef<[u8]>,
{
  type Item = Result<T, EventStreamError<E>>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    loop {
      match self.inner.as_mut().poll_next(cx) {
        Poll::Ready(Some(Ok(event))) => {
          if event.data.is_empty() {
            continue;
          }
          return Poll::Ready(Some(Self::parse_event(&event.data)));
        }
        Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(EventStreamError::SseParse(e)))),
        Poll::Ready(None) => return Poll::Ready(None),
        Poll::Pending => return Poll::Pending,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use futures::StreamExt;

  use super::*;

  #[derive(Debug, PartialEq, serde::Deserialize)]
  struct Notice {
    id: i32,
    message: String,
  }

  type ByteResult = Result<&'static [u8], std::convert::Infallible>;

  #[tokio::test]
  async fn decodes_events_and_skips_keepalives() {
    let frames: Vec<ByteResult> = vec![Ok(
      b"data: {\"id\":1,\"message\":\"hi\"}\n\n: keepalive\n\ndata: {\"id\":2,\"message\":\"bye\"}\n\n",
    )];
    let stream = EventStream::<Notice, _>::new(futures::stream::iter(frames));
    let notices: Vec<Notice> = stream.map(Result::unwrap).collect().await;

    assert_eq!(notices.len(), 2);
    assert_eq!(notices[1].message, "bye");
  }

  #[test]
  fn parse_event_reports_offending_path() {
    let result = EventStream::<Notice, futures::stream::Iter<std::vec::IntoIter<ByteResult>>>::parse_event(
      r#"{"id": "oops", "message": "hi"}"#,
    );

    match result.unwrap_err() {
      EventStreamError::JsonDeserialize { path, .. } => assert_eq!(path, "id"),
      EventStreamError::SseParse(err) => panic!("expected JSON error, got SSE error: {err}"),
    }
  }
}
