//! Purchasable credit balance.
//!
//! The balance is a reconciling cache: consumption is applied locally right
//! away and the next successful fetch overwrites it wholesale with the
//! backend's value.

use crate::error::{BackendError, BackendResult};
use crate::models::{
    CheckoutSession, CheckoutSessionRequest, CreditPackages, CreditTransaction,
};
use crate::ports::InterviewBackend;
use crate::session::UserProfile;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

pub const DEFAULT_TRANSACTION_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreditsState {
    pub balance: u32,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Package of {0} credits is not available")]
    UnknownPackage(u32),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Credit balance plus purchase helpers. The state is published on a watch
/// channel so a view can observe `loading` while a fetch is outstanding.
#[derive(Debug)]
pub struct CreditsStore {
    state: watch::Sender<CreditsState>,
    packages: Option<CreditPackages>,
}

impl Default for CreditsStore {
    fn default() -> Self {
        Self {
            state: watch::Sender::new(CreditsState::default()),
            packages: None,
        }
    }
}

impl CreditsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> CreditsState {
        self.state.borrow().clone()
    }

    /// Receives every state change, including the loading flag flipping.
    pub fn subscribe(&self) -> watch::Receiver<CreditsState> {
        self.state.subscribe()
    }

    pub fn balance(&self) -> u32 {
        self.state.borrow().balance
    }

    /// Refreshes the balance. On failure the last known balance is kept and
    /// the error message recorded.
    pub async fn fetch_credits(&mut self, backend: &dyn InterviewBackend, user_id: &str) -> u32 {
        self.state.send_modify(|state| state.loading = true);
        let result = backend.credit_balance(user_id).await;

        self.state.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(balance) => {
                    info!(user_id, balance = balance.balance, "Credits refreshed");
                    state.balance = balance.balance;
                    state.error = None;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Failed to fetch credits, keeping last known balance");
                    state.error = Some(e.to_string());
                }
            }
        });
        self.balance()
    }

    /// Optimistically consumes one credit. Never goes below zero.
    pub fn update_credits_after_use(&mut self) -> u32 {
        self.state
            .send_modify(|state| state.balance = state.balance.saturating_sub(1));
        self.balance()
    }

    pub async fn fetch_transactions(
        &self,
        backend: &dyn InterviewBackend,
        user_id: &str,
        limit: u32,
        page: u32,
    ) -> BackendResult<Vec<CreditTransaction>> {
        backend.credit_transactions(user_id, limit, page).await
    }

    /// Loads the purchasable packages and remembers them for checkout validation.
    pub async fn fetch_packages(
        &mut self,
        backend: &dyn InterviewBackend,
    ) -> BackendResult<CreditPackages> {
        let packages = backend.credit_packages().await?;
        self.packages = Some(packages.clone());
        Ok(packages)
    }

    /// Creates a hosted checkout session and returns its URL.
    pub async fn start_checkout(
        &mut self,
        backend: &dyn InterviewBackend,
        user: &UserProfile,
        package_size: u32,
    ) -> Result<CheckoutSession, CheckoutError> {
        let packages = match &self.packages {
            Some(packages) => packages.clone(),
            None => self.fetch_packages(backend).await?,
        };
        if !packages.available_packages.contains(&package_size) {
            return Err(CheckoutError::UnknownPackage(package_size));
        }

        let session = backend
            .create_checkout_session(CheckoutSessionRequest {
                user_id: user.uid.clone(),
                customer_email: user.email.clone(),
                package_size,
            })
            .await?;
        info!(user_id = %user.uid, package_size, "Checkout session created");
        Ok(session)
    }
}
