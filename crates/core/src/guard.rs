//! Duplicate-Submission Guard
//!
//! Keeps at most one outstanding call per logical operation. A request is
//! rejected when either the component-scoped coordinator already holds its
//! request key or the process-wide coordinator holds its operation name.
//!
//! Acquisition is a check-and-set under a mutex, so the guard also holds
//! when callers run on several threads. A safety timer releases both flags
//! after [`SAFETY_TIMEOUT`] even if the call never resolves.

use rand::distr::{Alphanumeric, SampleString};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// How long a call may hold its flags before they are released regardless.
pub const SAFETY_TIMEOUT: Duration = Duration::from_secs(30);

const NONCE_LEN: usize = 16;

#[derive(Debug, Default)]
struct CoordinatorState {
    /// Key -> identifier of the call currently holding it.
    active: HashMap<String, Uuid>,
    /// Key -> identifier of the most recently accepted call.
    latest: HashMap<String, Uuid>,
}

/// A set of in-flight operation keys.
#[derive(Debug, Default)]
pub struct RequestCoordinator {
    state: Mutex<CoordinatorState>,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` if nobody holds it. Returns false when it is already taken.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_as(key, Uuid::new_v4())
    }

    /// Claims `key` on behalf of the call identified by `id`.
    pub fn try_acquire_as(&self, key: &str, id: Uuid) -> bool {
        let mut state = self.lock();
        if state.active.contains_key(key) {
            return false;
        }
        state.active.insert(key.to_string(), id);
        state.latest.insert(key.to_string(), id);
        true
    }

    /// Releases `key` unconditionally and forgets its latest call.
    pub fn release(&self, key: &str) {
        let mut state = self.lock();
        state.active.remove(key);
        state.latest.remove(key);
    }

    /// Releases `key` only if it is still held by `id`.
    pub fn release_if_owner(&self, key: &str, id: Uuid) -> bool {
        let mut state = self.lock();
        if state.active.get(key) == Some(&id) {
            state.active.remove(key);
            true
        } else {
            false
        }
    }

    /// Finishes the call `id`: releases `key` if `id` still holds it, and drops
    /// the latest-call record if no newer call replaced it.
    pub fn complete(&self, key: &str, id: Uuid) {
        let mut state = self.lock();
        if state.active.get(key) == Some(&id) {
            state.active.remove(key);
        }
        if state.latest.get(key) == Some(&id) {
            state.latest.remove(key);
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.lock().active.contains_key(key)
    }

    /// True if `id` is the most recently accepted call for `key`.
    pub fn is_latest(&self, key: &str, id: Uuid) -> bool {
        self.lock().latest.get(key) == Some(&id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Identifiers attached to one accepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub request_id: Uuid,
    /// Random token that makes the request body unique even for repeated parameters.
    pub nonce: String,
}

impl RequestTicket {
    fn issue() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            nonce: Alphanumeric.sample_string(&mut rand::rng(), NONCE_LEN),
        }
    }
}

/// Result of running a call through the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome<T> {
    Completed(T),
    /// Another call for the same operation is in flight; nothing was sent.
    Duplicate,
    /// A newer call was accepted after this one; the result was discarded.
    Stale,
}

impl<T> GuardOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            GuardOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Guards one logical operation (e.g. question generation) for one component.
pub struct DedupGuard {
    operation: String,
    local: Arc<RequestCoordinator>,
    global: Arc<RequestCoordinator>,
    safety_timeout: Duration,
}

impl DedupGuard {
    /// Creates a guard with its own local coordinator, sharing `global` with
    /// every other component in the process.
    pub fn new(operation: impl Into<String>, global: Arc<RequestCoordinator>) -> Self {
        Self {
            operation: operation.into(),
            local: Arc::new(RequestCoordinator::new()),
            global,
            safety_timeout: SAFETY_TIMEOUT,
        }
    }

    pub fn with_safety_timeout(mut self, timeout: Duration) -> Self {
        self.safety_timeout = timeout;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// True while a call for this operation is outstanding anywhere in the process.
    pub fn is_in_flight(&self) -> bool {
        self.global.is_active(&self.operation)
    }

    /// Key identifying a request: the operation name plus its serialized parameters.
    pub fn request_key<P: Serialize + ?Sized>(&self, params: &P) -> String {
        let serialized = serde_json::to_string(params).unwrap_or_default();
        format!("{}:{}", self.operation, serialized)
    }

    /// Runs `call` unless an identical or same-operation call is in flight.
    ///
    /// Must be called from within a Tokio runtime; the safety timer is a
    /// spawned task.
    pub async fn run<P, F, Fut, T>(&self, params: &P, call: F) -> GuardOutcome<T>
    where
        P: Serialize + ?Sized,
        F: FnOnce(RequestTicket) -> Fut,
        Fut: Future<Output = T>,
    {
        let key = self.request_key(params);
        let ticket = RequestTicket::issue();
        let id = ticket.request_id;

        if !self.local.try_acquire_as(&key, id) {
            debug!(operation = %self.operation, "Rejected duplicate request (local)");
            return GuardOutcome::Duplicate;
        }
        if !self.global.try_acquire_as(&self.operation, id) {
            self.local.release_if_owner(&key, id);
            debug!(operation = %self.operation, "Rejected duplicate request (global)");
            return GuardOutcome::Duplicate;
        }

        let timer = {
            let local = self.local.clone();
            let global = self.global.clone();
            let operation = self.operation.clone();
            let key = key.clone();
            let timeout = self.safety_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let released_local = local.release_if_owner(&key, id);
                let released_global = global.release_if_owner(&operation, id);
                if released_local || released_global {
                    warn!(%operation, request_id = %id, "Request still pending after safety timeout, releasing guard");
                }
            })
        };

        debug!(operation = %self.operation, request_id = %id, "Issuing guarded request");
        let result = call(ticket).await;
        timer.abort();

        if !self.global.is_latest(&self.operation, id) {
            debug!(operation = %self.operation, request_id = %id, "Discarding stale response");
            return GuardOutcome::Stale;
        }

        self.local.complete(&key, id);
        self.global.complete(&self.operation, id);
        GuardOutcome::Completed(result)
    }
}
