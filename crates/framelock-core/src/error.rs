//! Player error types.

use std::fmt;

/// Errors surfaced by the playback engine and its collaborators.
///
/// Startup variants abort the process; `DecodeTransientFailure` and
/// `SeekFailure` are absorbed inside the decode worker and never propagate
/// past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Command-line parsing rejected an argument
    InvalidArgument(String),
    /// The input path does not exist or is unreadable
    FileNotFound(String),
    /// Demuxer or codec initialization failed
    DecoderOpenFailed(String),
    /// The transport clock could not be reached at startup
    ClockUnavailable(String),
    /// Window or render-surface creation failed
    GraphicsInitFailed(String),
    /// A single decode step failed; the worker retries
    DecodeTransientFailure(String),
    /// A stream reposition failed; the worker retries or skips
    SeekFailure(String),
    /// A frame allocation failed
    OutOfMemory(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            PlayerError::FileNotFound(msg) => write!(f, "file not found: {msg}"),
            PlayerError::DecoderOpenFailed(msg) => write!(f, "failed to open decoder: {msg}"),
            PlayerError::ClockUnavailable(msg) => write!(f, "transport clock unavailable: {msg}"),
            PlayerError::GraphicsInitFailed(msg) => write!(f, "graphics init failed: {msg}"),
            PlayerError::DecodeTransientFailure(msg) => write!(f, "decode failed: {msg}"),
            PlayerError::SeekFailure(msg) => write!(f, "seek failed: {msg}"),
            PlayerError::OutOfMemory(msg) => write!(f, "out of memory: {msg}"),
        }
    }
}

impl std::error::Error for PlayerError {}
