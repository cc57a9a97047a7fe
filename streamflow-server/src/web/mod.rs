//! HTTP surface for the UI runtime.
//!
//! Serves station lists as JSON and the static UI bundle.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, MAX_TAG_LIMIT, create_router};
pub use state::{AppState, Directory};
