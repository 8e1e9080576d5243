//! Iteration contracts for streaming request and response bodies.
//!
//! Newline-delimited JSON, RFC 7464 sequences, and SSE bodies are forward-only:
//! once the underlying connection has been read, the elements are gone. Retry
//! layers must consult [`IterationPolicy`] before attempting a second pass.

/// Whether a body stream may be iterated more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationPolicy {
  /// The body is backed by a live connection and can be consumed exactly once.
  #[default]
  Single,
  /// The body is buffered and may be replayed.
  Multiple,
}

impl IterationPolicy {
  #[must_use]
  pub fn is_replayable(self) -> bool {
    matches!(self, Self::Multiple)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplayError {
  #[error("single-pass body has already been consumed; retry layers must check IterationPolicy first")]
  AlreadyConsumed,
}

/// A body stream paired with its iteration contract.
///
/// The wrapper does not interpret the bytes; it only enforces that a
/// [`IterationPolicy::Single`] stream is handed out at most once.
pub struct StreamingBody<S> {
  stream: Option<S>,
  policy: IterationPolicy,
  rewind: Option<Box<dyn Fn() -> S + Send + Sync>>,
}

impl<S> std::fmt::Debug for StreamingBody<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StreamingBody")
      .field("policy", &self.policy)
      .finish_non_exhaustive()
  }
}

impl<S> StreamingBody<S> {
  /// Wraps a stream that can be consumed exactly once.
  pub fn single_pass(stream: S) -> Self {
    Self {
      stream: Some(stream),
      policy: IterationPolicy::Single,
      rewind: None,
    }
  }

  /// Wraps a replayable source. `rewind` produces a fresh stream per pass.
  pub fn replayable(rewind: impl Fn() -> S + Send + Sync + 'static) -> Self {
    Self {
      stream: None,
      policy: IterationPolicy::Multiple,
      rewind: Some(Box::new(rewind)),
    }
  }

  #[must_use]
  pub fn policy(&self) -> IterationPolicy {
    self.policy
  }

  /// Returns true if a call to [`Self::iterate`] would succeed.
  #[must_use]
  pub fn can_iterate(&self) -> bool {
    self.rewind.is_some() || self.stream.is_some()
  }

  /// Takes a pass over the body.
  ///
  /// # Errors
  ///
  /// Fails with [`ReplayError::AlreadyConsumed`] when a single-pass body has
  /// already been handed out.
  pub fn iterate(&mut self) -> Result<S, ReplayError> {
    if let Some(rewind) = &self.rewind {
      return Ok(rewind());
    }
    self.stream.take().ok_or(ReplayError::AlreadyConsumed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_pass_body_yields_once() {
    let mut body = StreamingBody::single_pass(vec![1u8, 2, 3]);
    assert_eq!(body.policy(), IterationPolicy::Single);
    assert!(body.can_iterate());

    assert_eq!(body.iterate().unwrap(), vec![1, 2, 3]);
    assert!(!body.can_iterate());
    assert_eq!(body.iterate().unwrap_err(), ReplayError::AlreadyConsumed);
  }

  #[test]
  fn replayable_body_yields_fresh_passes() {
    let mut body = StreamingBody::replayable(|| vec![9u8]);
    assert!(body.policy().is_replayable());

    assert_eq!(body.iterate().unwrap(), vec![9]);
    assert_eq!(body.iterate().unwrap(), vec![9]);
    assert!(body.can_iterate());
  }
}
