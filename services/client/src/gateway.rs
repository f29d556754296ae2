//! HTTP gateway to the interview backend.
//!
//! Every request passes through two interceptors: the bearer token of the
//! current session is attached, and the request is registered as in flight so
//! an identical request issued before the first completes is rejected.

use async_trait::async_trait;
use mockprep_core::error::{BackendError, BackendResult};
use mockprep_core::guard::RequestCoordinator;
use mockprep_core::models::{
    AnalyzeFeedbackRequest, AnalyzeFeedbackResponse, CheckoutSession, CheckoutSessionRequest,
    CreditBalance, CreditPackages, CreditTransaction, FeedbackReport, GenerateQuestionsRequest,
    GeneratedQuestions, HealthStatus,
};
use mockprep_core::ports::{InterviewBackend, TokenSource};
use mockprep_core::usage::UsageStats;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Marker the backend uses on 403 responses when the monthly quota is exhausted.
const LIMIT_REACHED_CODE: &str = "LIMIT_REACHED";

/// Removes its key from the in-flight registry when dropped.
struct InFlight<'a> {
    registry: &'a RequestCoordinator,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

pub struct ApiGateway {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
    in_flight: RequestCoordinator,
}

impl ApiGateway {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| BackendError::Network(format!("invalid base URL '{}'", base_url)))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            tokens,
            in_flight: RequestCoordinator::new(),
        })
    }

    /// Number of requests currently outstanding.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.active_count()
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> BackendResult<T> {
        let key = format!("GET {}", url);
        self.execute(key, self.http.get(url)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> BackendResult<T> {
        let serialized =
            serde_json::to_string(body).map_err(|e| BackendError::Decode(e.to_string()))?;
        let key = format!("POST {} {}", url, serialized);
        let request = self
            .http
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serialized);
        self.execute(key, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        key: String,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        if !self.in_flight.try_acquire(&key) {
            debug!(%key, "Blocked duplicate request");
            return Err(BackendError::DuplicateRequest(key));
        }
        let _in_flight = InFlight {
            registry: &self.in_flight,
            key,
        };

        let request = match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Request to backend failed");
            BackendError::Network(e.to_string())
        })?;
        let response = Self::check_response(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn check_response(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let json = serde_json::from_str::<serde_json::Value>(&body).ok();
        let message = extract_error_message(status, &body);

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!(%url, "Backend rejected credentials (401)");
                Err(BackendError::Unauthorized)
            }
            StatusCode::FORBIDDEN if json.as_ref().is_some_and(is_limit_reached) => {
                warn!(%url, "Usage limit reached (403)");
                Err(BackendError::QuotaExceeded(message))
            }
            StatusCode::FORBIDDEN => {
                warn!(%url, %message, "Backend denied access (403)");
                Err(BackendError::Forbidden(message))
            }
            s if s.is_server_error() => {
                error!(%url, status = s.as_u16(), %message, "Backend server error");
                Err(BackendError::Status {
                    status: s.as_u16(),
                    message,
                })
            }
            s => {
                debug!(%url, status = s.as_u16(), %message, "Backend request rejected");
                Err(BackendError::Status {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }
}

fn is_limit_reached(json: &serde_json::Value) -> bool {
    json.get("limitReached").and_then(|v| v.as_bool()) == Some(true)
        || json.get("code").and_then(|v| v.as_str()) == Some(LIMIT_REACHED_CODE)
}

/// Picks the most useful message out of an error response body: the `error`
/// field, then `message`, then the raw body, then the status reason.
pub(crate) fn extract_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                body.to_string()
            }
        })
}

#[async_trait]
impl InterviewBackend for ApiGateway {
    async fn health(&self) -> BackendResult<HealthStatus> {
        self.get(self.endpoint(&["health"])).await
    }

    async fn generate_questions(
        &self,
        request: GenerateQuestionsRequest,
    ) -> BackendResult<GeneratedQuestions> {
        self.post(self.endpoint(&["api", "questions", "generate"]), &request)
            .await
    }

    async fn analyze_feedback(
        &self,
        request: AnalyzeFeedbackRequest,
    ) -> BackendResult<FeedbackReport> {
        let response: AnalyzeFeedbackResponse =
            self.post(self.endpoint(&["api", "feedback", "analyze"]), &request)
                .await?;
        if !response.success {
            return Err(BackendError::Decode(
                "feedback response reported failure".to_string(),
            ));
        }
        Ok(response.data)
    }

    async fn usage_stats(&self) -> BackendResult<UsageStats> {
        self.get(self.endpoint(&["api", "usage", "stats"])).await
    }

    async fn credit_balance(&self, user_id: &str) -> BackendResult<CreditBalance> {
        self.get(self.endpoint(&["api", "credits", "balance", user_id]))
            .await
    }

    async fn credit_transactions(
        &self,
        user_id: &str,
        limit: u32,
        page: u32,
    ) -> BackendResult<Vec<CreditTransaction>> {
        let mut url = self.endpoint(&["api", "credits", "transactions", user_id]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &page.to_string());
        self.get(url).await
    }

    async fn credit_packages(&self) -> BackendResult<CreditPackages> {
        self.get(self.endpoint(&["api", "credits", "packages"]))
            .await
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> BackendResult<CheckoutSession> {
        self.post(self.endpoint(&["api", "credits", "checkout-session"]), &request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken(Option<String>);

    impl TokenSource for StaticToken {
        fn bearer_token(&self) -> Option<String> {
            self.0.clone()
        }
    }

    fn gateway(server: &MockServer, token: Option<&str>) -> ApiGateway {
        ApiGateway::new(
            server.uri(),
            Arc::new(StaticToken(token.map(String::from))),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn generate_request() -> GenerateQuestionsRequest {
        GenerateQuestionsRequest {
            job_type: "Backend Engineer".into(),
            requirements: "Rust".into(),
            number_of_questions: 3,
            nonce: "n0nce".into(),
            request_id: Uuid::new_v4(),
        }
    }

    mod error_messages {
        use super::*;

        #[test]
        fn extracts_error_field_from_json() {
            let message =
                extract_error_message(StatusCode::BAD_REQUEST, r#"{"error": "Invalid input"}"#);
            assert_eq!(message, "Invalid input");
        }

        #[test]
        fn prefers_error_over_message() {
            let message = extract_error_message(
                StatusCode::BAD_REQUEST,
                r#"{"error": "Specific", "message": "Generic"}"#,
            );
            assert_eq!(message, "Specific");
        }

        #[test]
        fn falls_back_to_message_then_body_then_reason() {
            assert_eq!(
                extract_error_message(StatusCode::BAD_REQUEST, r#"{"message": "Rate limited"}"#),
                "Rate limited"
            );
            assert_eq!(
                extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
                "Internal server error"
            );
            assert_eq!(extract_error_message(StatusCode::NOT_FOUND, ""), "Not Found");
        }
    }

    #[tokio::test]
    async fn test_generate_questions_sends_token_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/questions/generate"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_partial_json(json!({
                "jobType": "Backend Engineer",
                "requirements": "Rust",
                "numberOfQuestions": 3,
                "nonce": "n0nce"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "questions": ["Q1", "Q2", "Q3"],
                "usage": { "current": 1, "limit": 7, "remaining": 6, "isPremium": false }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generated = gateway(&server, Some("tok-123"))
            .generate_questions(generate_request())
            .await
            .unwrap();

        assert_eq!(generated.questions, vec!["Q1", "Q2", "Q3"]);
        assert_eq!(generated.usage.unwrap().remaining, 6);
    }

    #[tokio::test]
    async fn test_forbidden_with_limit_marker_is_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/questions/generate"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": "Monthly limit reached",
                "limitReached": true
            })))
            .mount(&server)
            .await;

        let err = gateway(&server, Some("tok"))
            .generate_questions(generate_request())
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::QuotaExceeded("Monthly limit reached".into()));
    }

    #[tokio::test]
    async fn test_limit_code_is_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "Upgrade to continue",
                "code": "LIMIT_REACHED"
            })))
            .mount(&server)
            .await;

        let err = gateway(&server, None)
            .generate_questions(generate_request())
            .await
            .unwrap_err();

        assert_eq!(err, BackendError::QuotaExceeded("Upgrade to continue".into()));
    }

    #[tokio::test]
    async fn test_plain_forbidden_and_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/usage/stats"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "Nope" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/credits/packages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gateway = gateway(&server, None);
        assert_eq!(
            gateway.usage_stats().await.unwrap_err(),
            BackendError::Forbidden("Nope".into())
        );
        assert_eq!(
            gateway.credit_packages().await.unwrap_err(),
            BackendError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = gateway(&server, None).health().await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Status {
                status: 503,
                message: "maintenance".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let gateway = ApiGateway::new(
            "http://127.0.0.1:9",
            Arc::new(StaticToken(None)),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = gateway.health().await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(gateway.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_identical_concurrent_requests_are_collapsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/usage/stats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "current": 2, "limit": 7, "remaining": 5, "isPremium": false
                    }))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway(&server, Some("tok"));
        let (first, second) = tokio::join!(gateway.usage_stats(), gateway.usage_stats());

        assert_eq!(first.unwrap(), UsageStats::new(2, 7, false));
        assert!(matches!(second, Err(BackendError::DuplicateRequest(_))));
        assert_eq!(gateway.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_feedback_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/feedback/analyze"))
            .and(body_partial_json(json!({ "answers": ["A1", "No answer provided"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "strengths": ["Concise"],
                    "improvements": ["Give examples"],
                    "overallAssessment": "Good start",
                    "score": 64
                }
            })))
            .mount(&server)
            .await;

        let report = gateway(&server, Some("tok"))
            .analyze_feedback(AnalyzeFeedbackRequest {
                questions: vec!["Q1".into(), "Q2".into()],
                answers: vec!["A1".into(), "No answer provided".into()],
                nonce: "x".into(),
                request_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert_eq!(report.score, 64);
        assert!(report.learning_resources.is_empty());
    }

    #[tokio::test]
    async fn test_user_id_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/credits/balance/team%2Fa%20b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "balance": 1, "userId": "team/a b" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/credits/transactions/team%2Fa%20b"))
            .and(query_param("limit", "10"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway(&server, None);
        assert_eq!(gateway.credit_balance("team/a b").await.unwrap().balance, 1);
        assert!(
            gateway
                .credit_transactions("team/a b", 10, 1)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_base_url_with_prefix_keeps_prefix() {
        let gateway = ApiGateway::new(
            "https://example.com/backend/",
            Arc::new(StaticToken(None)),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            gateway.endpoint(&["api", "usage", "stats"]).as_str(),
            "https://example.com/backend/api/usage/stats"
        );
        assert!(
            ApiGateway::new("not a url", Arc::new(StaticToken(None)), Duration::from_secs(1))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_credit_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/credits/balance/user-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "balance": 12, "userId": "user-1" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/credits/transactions/user-1"))
            .and(query_param("limit", "5"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "t1", "type": "purchase", "amount": 10, "createdAt": "2024-03-01T12:00:00Z" },
                { "id": "t2", "type": "usage", "amount": -1, "createdAt": "2024-03-02T12:00:00Z" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/credits/checkout-session"))
            .and(body_partial_json(json!({
                "userId": "user-1",
                "customerEmail": "jane@example.com",
                "packageSize": 10
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "url": "https://pay.example.com/c/1" })),
            )
            .mount(&server)
            .await;

        let gateway = gateway(&server, Some("tok"));
        assert_eq!(gateway.credit_balance("user-1").await.unwrap().balance, 12);

        let transactions = gateway.credit_transactions("user-1", 5, 2).await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].amount, -1);

        let checkout = gateway
            .create_checkout_session(CheckoutSessionRequest {
                user_id: "user-1".into(),
                customer_email: "jane@example.com".into(),
                package_size: 10,
            })
            .await
            .unwrap();
        assert_eq!(checkout.url, "https://pay.example.com/c/1");
    }
}
