//! Email/password auth provider backed by the auth HTTP API.

use crate::gateway::extract_error_message;
use async_trait::async_trait;
use mockprep_core::error::AuthError;
use mockprep_core::ports::AuthProvider;
use mockprep_core::session::AuthGrant;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Serialize)]
struct PasswordReset<'a> {
    email: &'a str,
}

pub struct HttpAuthProvider {
    http: Client,
    base_url: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/auth/{}", self.base_url, path)
    }

    async fn check_response(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(status, &body);
        debug!(status = status.as_u16(), %message, "Auth request rejected");
        Err(match status {
            StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials,
            StatusCode::CONFLICT => AuthError::AccountExists,
            _ => AuthError::Provider(message),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, AuthError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Auth provider unreachable");
                AuthError::Provider(e.to_string())
            })?;
        Self::check_response(response).await
    }

    async fn grant(response: Response) -> Result<AuthGrant, AuthError> {
        response
            .json::<AuthGrant>()
            .await
            .map_err(|e| AuthError::Provider(format!("Malformed auth response: {}", e)))
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        let body = Credentials {
            email,
            password,
            display_name: None,
        };
        Self::grant(self.post("signin", &body).await?).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<AuthGrant, AuthError> {
        let body = Credentials {
            email,
            password,
            display_name,
        };
        Self::grant(self.post("signup", &body).await?).await
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url("signout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.post("password-reset", &PasswordReset { email }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> HttpAuthProvider {
        HttpAuthProvider::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn grant_body() -> serde_json::Value {
        json!({
            "token": "tok-1",
            "user": {
                "uid": "u1",
                "email": "jane@example.com",
                "displayName": "Jane",
                "provider": "password"
            }
        })
    }

    #[tokio::test]
    async fn test_sign_in_returns_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/signin"))
            .and(body_json(json!({ "email": "jane@example.com", "password": "secret1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
            .expect(1)
            .mount(&server)
            .await;

        let grant = provider(&server)
            .sign_in("jane@example.com", "secret1")
            .await
            .unwrap();

        assert_eq!(grant.token, "tok-1");
        assert_eq!(grant.user.display_name.as_deref(), Some("Jane"));
        assert_eq!(grant.user.email_verified, None);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/signin"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/signup"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/password-reset"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({ "message": "Slow down" })),
            )
            .mount(&server)
            .await;

        let provider = provider(&server);
        assert_eq!(
            provider.sign_in("a@b.co", "x").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            provider
                .sign_up("a@b.co", "password1", Some("A".into()))
                .await
                .unwrap_err(),
            AuthError::AccountExists
        );
        assert_eq!(
            provider.send_password_reset("a@b.co").await.unwrap_err(),
            AuthError::Provider("Slow down".into())
        );
    }

    #[tokio::test]
    async fn test_sign_out_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/signout"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server).sign_out("tok-1").await.unwrap();
    }
}
