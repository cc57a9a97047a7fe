//! Mirror race fetcher.
//!
//! The station directory is served by several independently operated,
//! equivalent mirrors, any of which may be slow or down. Requests go to all
//! of them at once; the first good answer wins and the rest are discarded.
//!
//! Per-mirror failures are logged and absorbed here. Only total exhaustion
//! reaches callers, as [`RaceError`].

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod race;

pub use client::{
    DEFAULT_MIRRORS, MirrorConfig, MirrorRace, MirrorRequest, MirrorTransport, ReqwestTransport,
    is_path_segment,
};
pub use error::{MirrorError, MirrorFailure, RaceError};
pub use race::first_success;
