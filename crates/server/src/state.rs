//! Shared application state.

use std::sync::Arc;

use chunkdrop_transfer::UploadEngine;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<UploadEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Arc<UploadEngine>, config: Config) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}
