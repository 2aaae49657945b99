//! Asynchronous pull loop over the opened capture devices.
//!
//! The [`AggregateReader`] presents one or two devices as a single source with
//! exactly one read request outstanding while active. Each completion is
//! delivered to a [`ReadCallback`], whose [`Continuation`] decides whether the
//! next request is issued.

mod aggregate;

pub use aggregate::{AggregateReader, ReadCompletion};

use crate::models::error::CaptureError;
use crate::models::format::StreamTag;
use crate::models::sample::Sample;

/// Outcome of one read request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadEvent {
    Sample(Sample),
    EndOfStream,
    Error(CaptureError),
}

impl ReadEvent {
    pub fn is_sample(&self) -> bool {
        matches!(self, Self::Sample(_))
    }
}

/// Whether the pull loop issues another read after a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Stop,
}

/// Receives completions from an [`AggregateReader`].
///
/// Called on whichever thread completed the read, one completion at a time.
/// The reader never holds a lock while calling it.
pub trait ReadCallback: Send + Sync {
    fn on_read_complete(&self, stream: StreamTag, event: ReadEvent) -> Continuation;
}
