//! Authentication session store.
//!
//! Holds whether the user is signed in, their profile and the bearer token
//! issued by the auth provider. Credentials are validated locally before the
//! provider is ever contacted.

use crate::error::{AuthError, ValidationError};
use crate::ports::{AuthProvider, TokenSource};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

/// What a successful sign-in or sign-up hands back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Session,
    token: Option<String>,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required { field: "email" });
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::Invalid {
            field: "email",
            reason: "must be a valid email address".to_string(),
        }),
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required { field: "password" });
    }
    let reason = if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!("must be at least {} characters", MIN_PASSWORD_LEN))
    } else if !password.chars().any(|c| c.is_alphabetic()) {
        Some("must contain a letter".to_string())
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("must contain a digit".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ValidationError::Invalid {
            field: "password",
            reason,
        }),
        None => Ok(()),
    }
}

/// Process-wide auth state, shared behind an `Arc`.
pub struct SessionStore {
    provider: Arc<dyn AuthProvider>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn session(&self) -> Session {
        self.read().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().session.authenticated
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().session.user.clone()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::Required { field: "password" }.into());
        }
        let grant = self.provider.sign_in(email.trim(), password).await?;
        info!(email = %grant.user.email, provider = %grant.user.provider, "Signed in");
        Ok(self.apply_grant(grant))
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<UserProfile, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let grant = self
            .provider
            .sign_up(email.trim(), password, display_name)
            .await?;
        info!(email = %grant.user.email, "Account created");
        Ok(self.apply_grant(grant))
    }

    /// Signs out. Local state is cleared even if the provider call fails.
    pub async fn sign_out(&self) {
        let token = self.write().token.take();
        if let Some(token) = token {
            if let Err(e) = self.provider.sign_out(&token).await {
                warn!(error = %e, "Provider sign-out failed; local session cleared anyway");
            }
        }
        *self.write() = SessionState::default();
        info!("Signed out");
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        self.provider.send_password_reset(email.trim()).await?;
        info!(email = %email.trim(), "Password reset email requested");
        Ok(())
    }

    /// Applies a profile change pushed by the provider (e.g. email verified).
    /// Ignored while signed out.
    pub fn apply_provider_update(&self, user: UserProfile) -> bool {
        let mut state = self.write();
        if !state.session.authenticated {
            return false;
        }
        state.session.user = Some(user);
        true
    }

    fn apply_grant(&self, grant: AuthGrant) -> UserProfile {
        let mut state = self.write();
        state.token = Some(grant.token);
        state.session = Session {
            authenticated: true,
            user: Some(grant.user.clone()),
        };
        grant.user
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenSource for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.read().token.clone()
    }
}
