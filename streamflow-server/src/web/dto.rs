//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

/// Query string for a tag lookup.
#[derive(Debug, Deserialize)]
pub struct TagQuery {
    /// Number of stations wanted (defaults to 30)
    pub limit: Option<usize>,
}

/// Query string for a favourites lookup.
#[derive(Debug, Deserialize)]
pub struct UuidQuery {
    /// Comma-separated station ids
    pub ids: Option<String>,
}

impl UuidQuery {
    /// The requested ids, with blanks removed.
    pub fn ids(&self) -> Vec<String> {
        self.ids
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
