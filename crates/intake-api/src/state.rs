//! Application state for the API server.

use crate::error::ApiError;
use intake_core::engine::IntakeService;
use intake_core::storage::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    service: Option<Arc<IntakeService>>,
    pub version: String,
}

impl AppState {
    pub fn new(store: Option<Store>) -> Self {
        Self {
            service: store.map(|s| Arc::new(IntakeService::with_store(s))),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Every data route goes through here; a server booted without a store
    /// answers 503 instead of panicking.
    pub fn service(&self) -> Result<&IntakeService, ApiError> {
        self.service.as_deref().ok_or(ApiError::StoreUnavailable)
    }
}
