//! Runtime support for artifacts produced by the `oapic` compiler.
//!
//! Generated clients and servers lean on this crate for the pieces that do
//! not belong in generated text: single-pass streaming body sequences and
//! Accept-header media range handling.

pub mod body;
pub mod double_option;
#[cfg(feature = "eventsource")]
pub mod event_stream;
pub mod json_lines;
pub mod json_seq;
pub mod media_range;
pub mod multipart;
pub mod urlencoded;

pub use body::{IterationPolicy, ReplayError, StreamingBody};
pub use bytes;
#[cfg(feature = "eventsource")]
pub use event_stream::{EventStream, EventStreamError};
pub use json_lines::{JsonLinesDecoder, JsonLinesEncoder, JsonStreamError};
pub use json_seq::{JsonSeqDecoder, JsonSeqEncoder};
pub use media_range::{MediaRange, negotiate, negotiate_header, parse_accept_header, sort_by_quality};
