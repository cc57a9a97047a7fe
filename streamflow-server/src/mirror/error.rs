//! Mirror fetch error types.

use std::time::Duration;

/// Why a single mirror failed to answer.
///
/// These never leave the mirror module on their own; they are only carried
/// inside [`RaceError::AllMirrorsFailed`].
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The mirror did not answer within its time budget
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Network, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP status {status}")]
    BadStatus { status: u16 },

    /// Body was not valid JSON
    #[error("unparsable body: {message}")]
    BadBody { message: String },

    /// Mirror base URL cannot carry a request path
    #[error("invalid mirror URL {url}")]
    InvalidUrl { url: String },

    /// Path segment would be dropped or resolved away
    #[error("invalid path segment {segment:?}")]
    InvalidSegment { segment: String },
}

/// A mirror together with the way it failed.
#[derive(Debug)]
pub struct MirrorFailure {
    pub mirror: String,
    pub error: MirrorError,
}

/// Errors from racing a request across mirrors.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    /// The mirror list is empty
    #[error("no mirrors configured")]
    NoMirrorsConfigured,

    /// Every mirror failed
    #[error("all {} mirrors failed", .failures.len())]
    AllMirrorsFailed { failures: Vec<MirrorFailure> },
}
