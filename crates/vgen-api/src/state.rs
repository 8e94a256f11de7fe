//! Application state.

use std::sync::Arc;

use vgen_firestore::{DocumentStore, VideoJobRepository};
use vgen_worker::JobOrchestrator;

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn DocumentStore>,
    pub jobs: VideoJobRepository,
    pub orchestrator: Arc<JobOrchestrator>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn DocumentStore>,
        orchestrator: Arc<JobOrchestrator>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            config,
            jobs: VideoJobRepository::new(store.clone()),
            store,
            orchestrator,
            verifier,
        }
    }
}
