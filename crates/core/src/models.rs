//! Wire Models
//!
//! Request and response bodies exchanged with the interview backend. Field
//! names are camelCase on the wire.

use crate::usage::UsageStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    pub job_type: String,
    pub requirements: String,
    pub number_of_questions: u32,
    pub nonce: String,
    pub request_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestions {
    pub questions: Vec<String>,
    #[serde(default)]
    pub usage: Option<UsageStats>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFeedbackRequest {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub nonce: String,
    pub request_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalyzeFeedbackResponse {
    pub success: bool,
    pub data: FeedbackReport,
}

/// Scored feedback for a completed practice interview.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_assessment: String,
    pub score: u32,
    #[serde(default)]
    pub learning_resources: Vec<LearningResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningResource {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub balance: u32,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Refund,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Positive for purchases and refunds, negative for usage.
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackagePrice {
    pub size: u32,
    pub unit_price: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreditPackages {
    pub available_packages: Vec<u32>,
    pub prices: Vec<PackagePrice>,
}

impl CreditPackages {
    /// Total price of a package, if the backend lists one for that size.
    pub fn total_price(&self, size: u32) -> Option<f64> {
        self.prices
            .iter()
            .find(|p| p.size == size)
            .map(|p| p.unit_price * size as f64)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub user_id: String,
    pub customer_email: String,
    pub package_size: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Questions used when generation is unavailable.
pub fn default_questions() -> Vec<String> {
    [
        "Tell me about yourself and your professional background.",
        "Why are you interested in this role?",
        "Describe a challenging project you worked on and how you handled it.",
        "What are your greatest strengths, and what are you working to improve?",
        "Where do you see yourself in five years?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Feedback shown when the analysis service cannot be reached.
pub fn default_feedback() -> FeedbackReport {
    FeedbackReport {
        strengths: vec!["You completed the full practice interview.".to_string()],
        improvements: vec![
            "Detailed feedback is unavailable right now. Retake the interview later for a full analysis."
                .to_string(),
        ],
        overall_assessment: "We could not analyze your answers at this time.".to_string(),
        score: 0,
        learning_resources: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_uses_camel_case() {
        let request = GenerateQuestionsRequest {
            job_type: "Backend Engineer".into(),
            requirements: "Rust".into(),
            number_of_questions: 5,
            nonce: "abc".into(),
            request_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jobType"], "Backend Engineer");
        assert_eq!(value["numberOfQuestions"], 5);
        assert_eq!(value["nonce"], "abc");
        assert!(value.get("requestId").is_some());
    }

    #[test]
    fn test_generated_questions_usage_is_optional() {
        let parsed: GeneratedQuestions =
            serde_json::from_value(json!({ "questions": ["Q1", "Q2"] })).unwrap();
        assert_eq!(parsed.questions, vec!["Q1", "Q2"]);
        assert!(parsed.usage.is_none());

        let parsed: GeneratedQuestions = serde_json::from_value(json!({
            "questions": ["Q1"],
            "usage": { "current": 3, "limit": 7, "remaining": 4, "isPremium": false }
        }))
        .unwrap();
        assert_eq!(parsed.usage.unwrap().remaining, 4);
    }

    #[test]
    fn test_feedback_response_parsing() {
        let response: AnalyzeFeedbackResponse = serde_json::from_value(json!({
            "success": true,
            "data": {
                "strengths": ["Clear"],
                "improvements": ["Use STAR"],
                "overallAssessment": "Good",
                "score": 78,
                "learningResources": [{ "title": "STAR method", "url": "https://example.com/star" }]
            }
        }))
        .unwrap();
        assert!(response.success);
        assert_eq!(response.data.score, 78);
        assert_eq!(response.data.learning_resources[0].title, "STAR method");
        assert_eq!(response.data.learning_resources[0].description, None);
    }

    #[test]
    fn test_unknown_transaction_kind_maps_to_other() {
        let tx: CreditTransaction = serde_json::from_value(json!({
            "id": "tx_1",
            "type": "bonus",
            "amount": 3,
            "createdAt": "2024-01-15T10:30:00Z"
        }))
        .unwrap();
        assert_eq!(tx.kind, TransactionKind::Other);
        assert_eq!(tx.amount, 3);
    }

    #[test]
    fn test_package_total_price() {
        let packages = CreditPackages {
            available_packages: vec![5, 10],
            prices: vec![
                PackagePrice { size: 5, unit_price: 2.0 },
                PackagePrice { size: 10, unit_price: 1.5 },
            ],
        };
        assert_eq!(packages.total_price(10), Some(15.0));
        assert_eq!(packages.total_price(20), None);
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus { status: "ok".into() }.is_ok());
        assert!(!HealthStatus { status: "degraded".into() }.is_ok());
    }

    #[test]
    fn test_defaults_are_never_empty() {
        assert_eq!(default_questions().len(), 5);
        let feedback = default_feedback();
        assert_eq!(feedback.score, 0);
        assert!(!feedback.strengths.is_empty());
        assert!(!feedback.improvements.is_empty());
    }
}
