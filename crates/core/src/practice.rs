//! Practice Flow
//!
//! Drives the wizard through one mock interview and performs the side effects
//! it requests: question generation (cache first, then a guarded backend
//! call), feedback analysis, and the usage/credit bookkeeping that follows.
//! Every network failure has a local fallback, so the wizard always has
//! content to show.

use crate::cache::QuestionCache;
use crate::credits::CreditsStore;
use crate::error::{BackendError, WizardError};
use crate::guard::{DedupGuard, GuardOutcome, RequestCoordinator};
use crate::models::{
    AnalyzeFeedbackRequest, FeedbackReport, GenerateQuestionsRequest, default_feedback,
    default_questions,
};
use crate::ports::InterviewBackend;
use crate::session::SessionStore;
use crate::usage::UsageStore;
use crate::wizard::{Step, Wizard};
use crate::Command;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const GENERATE_OPERATION: &str = "generate_questions";
pub const ANALYZE_OPERATION: &str = "analyze_feedback";

pub const DEFAULT_QUESTION_COUNT: u32 = 5;

const QUOTA_MESSAGE: &str = "You have reached your monthly limit of practice interviews. Upgrade to premium to keep practicing.";
const OFFLINE_MESSAGE: &str = "The interview service is unreachable. Default questions and feedback will be used.";
const GENERATION_FAILED_MESSAGE: &str = "We could not generate questions for this role, so a default set is shown.";
const ANALYSIS_FAILED_MESSAGE: &str = "We could not analyze your answers, so general feedback is shown.";

/// Something the presentation layer should tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Non-blocking banner; the flow continued with fallback content.
    Warning(String),
    /// Blocking modal; generation stays disabled until acknowledged.
    QuotaExceeded(String),
    /// Generic failure message; fallback content was applied.
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Warning(message) | Notice::QuotaExceeded(message) | Notice::Error(message) => {
                f.write_str(message)
            }
        }
    }
}

/// Where the wizard ended up after a user action, plus any notices.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: Step,
    pub progress_percent: f64,
    pub notices: Vec<Notice>,
}

pub struct PracticeFlow {
    backend: Arc<dyn InterviewBackend>,
    session: Arc<SessionStore>,
    cache: Arc<QuestionCache>,
    generate_guard: DedupGuard,
    analyze_guard: DedupGuard,
    wizard: Wizard,
    usage: UsageStore,
    credits: CreditsStore,
    feedback: Option<FeedbackReport>,
    number_of_questions: u32,
    offline: bool,
    quota_blocked: bool,
}

impl PracticeFlow {
    pub fn new(
        backend: Arc<dyn InterviewBackend>,
        session: Arc<SessionStore>,
        cache: Arc<QuestionCache>,
        coordinator: Arc<RequestCoordinator>,
    ) -> Self {
        Self {
            backend,
            session,
            cache,
            generate_guard: DedupGuard::new(GENERATE_OPERATION, coordinator.clone()),
            analyze_guard: DedupGuard::new(ANALYZE_OPERATION, coordinator),
            wizard: Wizard::new(),
            usage: UsageStore::new(),
            credits: CreditsStore::new(),
            feedback: None,
            number_of_questions: DEFAULT_QUESTION_COUNT,
            offline: false,
            quota_blocked: false,
        }
    }

    pub fn with_question_count(mut self, count: u32) -> Self {
        self.number_of_questions = count;
        self
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn usage(&self) -> &UsageStore {
        &self.usage
    }

    pub fn credits(&self) -> &CreditsStore {
        &self.credits
    }

    pub fn credits_mut(&mut self) -> &mut CreditsStore {
        &mut self.credits
    }

    pub fn feedback(&self) -> Option<&FeedbackReport> {
        self.feedback.as_ref()
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn is_quota_blocked(&self) -> bool {
        self.quota_blocked
    }

    pub fn set_job_type(&mut self, job_type: impl Into<String>) {
        self.wizard.set_job_type(job_type);
    }

    pub fn set_requirements(&mut self, requirements: impl Into<String>) {
        self.wizard.set_requirements(requirements);
    }

    pub fn answer(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), crate::error::ValidationError> {
        self.wizard.answer(index, text)
    }

    /// Probes the backend and loads usage and credits for the signed-in user.
    pub async fn start(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        match self.backend.health().await {
            Ok(status) if status.is_ok() => {
                self.offline = false;
            }
            Ok(status) => {
                warn!(status = %status.status, "Backend reported unhealthy status");
                self.offline = true;
                notices.push(Notice::Warning(OFFLINE_MESSAGE.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "Health check failed");
                self.offline = true;
                notices.push(Notice::Warning(OFFLINE_MESSAGE.to_string()));
            }
        }

        if !self.offline {
            self.usage.fetch_usage(self.backend.as_ref()).await;
            self.refresh_credits().await;
        }
        notices
    }

    /// Validates the current step and moves forward, running any requested side effects.
    pub async fn next(&mut self) -> Result<StepReport, WizardError> {
        self.wizard.validate_current()?;

        if self.wizard.step() == Step::Requirements && self.quota_blocked {
            info!("Generation blocked by usage quota");
            return Ok(self.report(vec![Notice::QuotaExceeded(QUOTA_MESSAGE.to_string())]));
        }

        let commands = self.wizard.advance()?;
        let mut notices = Vec::new();
        for command in commands {
            self.execute(command, &mut notices).await;
        }
        Ok(self.report(notices))
    }

    pub fn back(&mut self) -> Result<StepReport, WizardError> {
        self.wizard.retreat()?;
        Ok(self.report(Vec::new()))
    }

    /// Starts a fresh interview from the feedback step.
    pub async fn retake(&mut self) -> Result<StepReport, WizardError> {
        let commands = self.wizard.retake()?;
        self.feedback = None;
        let mut notices = Vec::new();
        for command in commands {
            self.execute(command, &mut notices).await;
        }
        Ok(self.report(notices))
    }

    /// Dismisses the quota modal. Generation is attempted again on the next advance.
    pub fn acknowledge_quota(&mut self) {
        self.quota_blocked = false;
    }

    /// Re-runs question generation when the Questions step was reached with no
    /// questions, which happens when the earlier call was dropped as a
    /// duplicate or a stale response.
    pub async fn retry_generation(&mut self) -> StepReport {
        let mut notices = Vec::new();
        let session = self.wizard.session();
        if self.wizard.step() == Step::Questions && session.questions.is_empty() {
            let command = Command::GenerateQuestions {
                job_type: session.job_type.clone(),
                requirements: session.requirements.clone(),
            };
            self.execute(command, &mut notices).await;
        }
        self.report(notices)
    }

    fn report(&self, notices: Vec<Notice>) -> StepReport {
        StepReport {
            step: self.wizard.step(),
            progress_percent: self.wizard.progress_percent(),
            notices,
        }
    }

    async fn execute(&mut self, command: Command, notices: &mut Vec<Notice>) {
        match command {
            Command::GenerateQuestions {
                job_type,
                requirements,
            } => self.generate_questions(job_type, requirements, notices).await,
            Command::AnalyzeFeedback { questions, answers } => {
                self.analyze_feedback(questions, answers, notices).await
            }
            Command::RefreshCredits => self.refresh_credits().await,
        }
    }

    async fn generate_questions(
        &mut self,
        job_type: String,
        requirements: String,
        notices: &mut Vec<Notice>,
    ) {
        if let Some(questions) = self.cache.get(&job_type, &requirements) {
            info!(count = questions.len(), "Using cached questions");
            self.wizard.set_questions(questions);
            return;
        }

        if self.offline {
            debug!("Offline, using default questions");
            self.wizard.set_questions(default_questions());
            return;
        }

        let backend = self.backend.clone();
        let number_of_questions = self.number_of_questions;
        let (req_job_type, req_requirements) = (job_type.clone(), requirements.clone());
        let outcome = self
            .generate_guard
            .run(&(&job_type, &requirements), |ticket| async move {
                backend
                    .generate_questions(GenerateQuestionsRequest {
                        job_type: req_job_type,
                        requirements: req_requirements,
                        number_of_questions,
                        nonce: ticket.nonce,
                        request_id: ticket.request_id,
                    })
                    .await
            })
            .await;

        match outcome {
            GuardOutcome::Completed(Ok(generated)) => {
                if let Some(usage) = generated.usage {
                    self.usage.set(usage);
                }
                if generated.questions.is_empty() {
                    warn!("Backend returned no questions, using defaults");
                    notices.push(Notice::Warning(GENERATION_FAILED_MESSAGE.to_string()));
                    self.wizard.set_questions(default_questions());
                    return;
                }
                info!(count = generated.questions.len(), "Questions generated");
                if let Err(e) = self
                    .cache
                    .set(&job_type, &requirements, generated.questions.clone())
                {
                    warn!(error = %e, "Failed to cache generated questions");
                }
                self.wizard.set_questions(generated.questions);
            }
            GuardOutcome::Completed(Err(BackendError::QuotaExceeded(message))) => {
                warn!(%message, "Question generation rejected by quota");
                self.quota_blocked = true;
                if let Err(e) = self.wizard.retreat() {
                    error!(error = %e, "Could not return to requirements after quota rejection");
                }
                let message = if message.is_empty() {
                    QUOTA_MESSAGE.to_string()
                } else {
                    message
                };
                notices.push(Notice::QuotaExceeded(message));
            }
            GuardOutcome::Completed(Err(e)) => {
                error!(error = %e, "Question generation failed, using defaults");
                notices.push(Self::failure_notice(&e, GENERATION_FAILED_MESSAGE));
                self.wizard.set_questions(default_questions());
            }
            GuardOutcome::Duplicate => {
                debug!("Question generation already in flight");
            }
            GuardOutcome::Stale => {
                debug!("Ignoring stale question generation response");
            }
        }
    }

    async fn analyze_feedback(
        &mut self,
        questions: Vec<String>,
        answers: Vec<String>,
        notices: &mut Vec<Notice>,
    ) {
        if self.offline {
            self.feedback = Some(default_feedback());
            return;
        }

        let backend = self.backend.clone();
        let params = (questions.clone(), answers.clone());
        let outcome = self
            .analyze_guard
            .run(&params, |ticket| async move {
                backend
                    .analyze_feedback(AnalyzeFeedbackRequest {
                        questions,
                        answers,
                        nonce: ticket.nonce,
                        request_id: ticket.request_id,
                    })
                    .await
            })
            .await;

        match outcome {
            GuardOutcome::Completed(Ok(report)) => {
                info!(score = report.score, "Feedback received");
                self.feedback = Some(report);
                let remaining = self.credits.update_credits_after_use();
                debug!(remaining, "Applied optimistic credit decrement");
                self.usage.fetch_usage(self.backend.as_ref()).await;
            }
            GuardOutcome::Completed(Err(e)) => {
                error!(error = %e, "Feedback analysis failed, using default feedback");
                notices.push(Self::failure_notice(&e, ANALYSIS_FAILED_MESSAGE));
                self.feedback = Some(default_feedback());
            }
            GuardOutcome::Duplicate => {
                debug!("Feedback analysis already in flight");
            }
            GuardOutcome::Stale => {
                debug!("Ignoring stale feedback response");
            }
        }
    }

    async fn refresh_credits(&mut self) {
        if let Some(user) = self.session.user() {
            self.credits
                .fetch_credits(self.backend.as_ref(), &user.uid)
                .await;
        }
    }

    fn failure_notice(e: &BackendError, fallback_message: &str) -> Notice {
        if e.is_connectivity() {
            Notice::Warning(fallback_message.to_string())
        } else {
            Notice::Error(fallback_message.to_string())
        }
    }
}
