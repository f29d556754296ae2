//! Shared Application State
//!
//! Wires the HTTP adapters into the core stores once at startup.

use crate::auth::HttpAuthProvider;
use crate::config::Config;
use crate::gateway::ApiGateway;
use crate::storage::FileStore;
use anyhow::Context;
use mockprep_core::cache::QuestionCache;
use mockprep_core::guard::RequestCoordinator;
use mockprep_core::ports::{InterviewBackend, SystemClock};
use mockprep_core::practice::PracticeFlow;
use mockprep_core::session::SessionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub backend: Arc<dyn InterviewBackend>,
    pub cache: Arc<QuestionCache>,
    pub coordinator: Arc<RequestCoordinator>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let auth = HttpAuthProvider::new(&config.auth_url, config.request_timeout)
            .context("Failed to build auth client")?;
        let session = Arc::new(SessionStore::new(Arc::new(auth)));

        let gateway = ApiGateway::new(&config.api_url, session.clone(), config.request_timeout)
            .context("Failed to build API client")?;

        let store = Arc::new(FileStore::new(config.cache_dir.clone()));
        let cache = Arc::new(QuestionCache::new(store, Arc::new(SystemClock)));

        Ok(Self {
            config: Arc::new(config),
            session,
            backend: Arc::new(gateway),
            cache,
            coordinator: Arc::new(RequestCoordinator::new()),
        })
    }

    /// A fresh practice run sharing this state's session, cache and request flags.
    pub fn practice_flow(&self) -> PracticeFlow {
        PracticeFlow::new(
            self.backend.clone(),
            self.session.clone(),
            self.cache.clone(),
            self.coordinator.clone(),
        )
        .with_question_count(self.config.question_count)
    }
}
