//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::FileStore;
use crate::directory::StationDirectory;
use crate::mirror::ReqwestTransport;

/// The directory served over HTTP: real mirrors, on-disk cache.
pub type Directory = StationDirectory<ReqwestTransport, FileStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Station lookups
    pub directory: Arc<Directory>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(directory: Directory) -> Self {
        Self {
            directory: Arc::new(directory),
        }
    }
}
