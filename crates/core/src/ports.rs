//! Service contracts (traits) at the boundary of the core.
//!
//! The core never talks HTTP or touches the filesystem directly. The client
//! service provides the real implementations; tests use `mockall` mocks and
//! the in-memory helpers defined here.

use crate::error::{AuthError, BackendResult, CacheError};
use crate::models::{
    AnalyzeFeedbackRequest, CheckoutSession, CheckoutSessionRequest, CreditBalance,
    CreditPackages, CreditTransaction, FeedbackReport, GenerateQuestionsRequest,
    GeneratedQuestions, HealthStatus,
};
use crate::session::AuthGrant;
use crate::usage::UsageStats;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// The interview backend consumed over HTTP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    /// Liveness probe.
    async fn health(&self) -> BackendResult<HealthStatus>;

    async fn generate_questions(
        &self,
        request: GenerateQuestionsRequest,
    ) -> BackendResult<GeneratedQuestions>;

    async fn analyze_feedback(&self, request: AnalyzeFeedbackRequest)
    -> BackendResult<FeedbackReport>;

    async fn usage_stats(&self) -> BackendResult<UsageStats>;

    async fn credit_balance(&self, user_id: &str) -> BackendResult<CreditBalance>;

    async fn credit_transactions(
        &self,
        user_id: &str,
        limit: u32,
        page: u32,
    ) -> BackendResult<Vec<CreditTransaction>>;

    async fn credit_packages(&self) -> BackendResult<CreditPackages>;

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> BackendResult<CheckoutSession>;
}

/// The external authentication provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<AuthGrant, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
}

/// Supplies the bearer token attached to backend requests.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Durable string storage addressed by a fixed key.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn save(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// A `KeyValueStore` that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Source of the current time, so TTL checks can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}
