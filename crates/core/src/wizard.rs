//! Practice Wizard State Machine
//!
//! The practice flow walks the user through five fixed steps, from picking a
//! role to reading the scored feedback. Transitions are checked against an
//! explicit table; anything not listed there is rejected with a typed error.

use crate::{
    Command,
    error::{ValidationError, WizardError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Placeholder recorded for every question the user skipped.
pub const NO_ANSWER: &str = "No answer provided";

/// Number of steps in one traversal of the wizard.
pub const TOTAL_STEPS: usize = 5;

/// One step of the practice wizard, in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    JobType,
    Requirements,
    Questions,
    Answering,
    Feedback,
}

impl Step {
    pub const ALL: [Step; TOTAL_STEPS] = [
        Step::JobType,
        Step::Requirements,
        Step::Questions,
        Step::Answering,
        Step::Feedback,
    ];

    /// Zero-based position of the step in the traversal.
    pub fn index(self) -> usize {
        match self {
            Step::JobType => 0,
            Step::Requirements => 1,
            Step::Questions => 2,
            Step::Answering => 3,
            Step::Feedback => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Step::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Step> {
        self.index().checked_sub(1).and_then(Step::from_index)
    }

    /// Human readable title shown above the step.
    pub fn title(self) -> &'static str {
        match self {
            Step::JobType => "Job Type",
            Step::Requirements => "Requirements",
            Step::Questions => "Questions",
            Step::Answering => "Practice",
            Step::Feedback => "Feedback",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Every transition the wizard accepts, as (from, to) pairs.
const TRANSITIONS: &[(Step, Step)] = &[
    // advance
    (Step::JobType, Step::Requirements),
    (Step::Requirements, Step::Questions),
    (Step::Questions, Step::Answering),
    (Step::Answering, Step::Feedback),
    // retreat
    (Step::Requirements, Step::JobType),
    (Step::Questions, Step::Requirements),
    (Step::Answering, Step::Questions),
    (Step::Feedback, Step::Answering),
    // retake
    (Step::Feedback, Step::JobType),
];

/// Returns true if the wizard may move directly from `from` to `to`.
pub fn is_transition_allowed(from: Step, to: Step) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// The data of the interview currently being practiced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub job_type: String,
    pub requirements: String,
    pub questions: Vec<String>,
    /// Free-text answers keyed by question index.
    pub answers: BTreeMap<usize, String>,
}

impl PracticeSession {
    pub fn is_empty(&self) -> bool {
        self.job_type.is_empty()
            && self.requirements.is_empty()
            && self.questions.is_empty()
            && self.answers.is_empty()
    }

    /// Answers aligned with `questions`, using the placeholder for gaps.
    pub fn answers_in_order(&self) -> Vec<String> {
        (0..self.questions.len())
            .map(|i| {
                self.answers
                    .get(&i)
                    .cloned()
                    .unwrap_or_else(|| NO_ANSWER.to_string())
            })
            .collect()
    }

    /// Fills every unanswered (or blank) question with the placeholder.
    fn backfill_answers(&mut self) {
        for i in 0..self.questions.len() {
            let entry = self.answers.entry(i).or_default();
            if entry.trim().is_empty() {
                *entry = NO_ANSWER.to_string();
            }
        }
    }
}

/// The five-step practice wizard.
#[derive(Debug, Clone)]
pub struct Wizard {
    step: Step,
    session: PracticeSession,
    is_new_session: bool,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    /// Creates a wizard positioned on the first step with empty data.
    pub fn new() -> Self {
        Self {
            step: Step::JobType,
            session: PracticeSession::default(),
            is_new_session: true,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn session(&self) -> &PracticeSession {
        &self.session
    }

    /// True until the feedback step has been reached in this traversal.
    pub fn is_new_session(&self) -> bool {
        self.is_new_session
    }

    pub fn progress_percent(&self) -> f64 {
        (self.step.index() + 1) as f64 / TOTAL_STEPS as f64 * 100.0
    }

    /// Sets the role. Changing it discards questions generated for the old one.
    pub fn set_job_type(&mut self, job_type: impl Into<String>) {
        let job_type = job_type.into();
        if job_type != self.session.job_type {
            self.session.job_type = job_type;
            self.discard_generated();
        }
    }

    /// Sets the requirements. Changing them discards previously generated questions.
    pub fn set_requirements(&mut self, requirements: impl Into<String>) {
        let requirements = requirements.into();
        if requirements != self.session.requirements {
            self.session.requirements = requirements;
            self.discard_generated();
        }
    }

    /// Replaces the question list. Answers to the previous list are dropped.
    pub fn set_questions(&mut self, questions: Vec<String>) {
        self.session.questions = questions;
        self.session.answers.clear();
    }

    /// Records the answer to the question at `index`.
    pub fn answer(&mut self, index: usize, text: impl Into<String>) -> Result<(), ValidationError> {
        if index >= self.session.questions.len() {
            return Err(ValidationError::Invalid {
                field: "answer",
                reason: format!(
                    "question {} does not exist ({} questions)",
                    index + 1,
                    self.session.questions.len()
                ),
            });
        }
        self.session.answers.insert(index, text.into());
        Ok(())
    }

    /// Checks the fields the current step requires before the user may move on.
    pub fn validate_current(&self) -> Result<(), ValidationError> {
        match self.step {
            Step::JobType if self.session.job_type.trim().is_empty() => {
                Err(ValidationError::Required { field: "jobType" })
            }
            Step::Requirements if self.session.requirements.trim().is_empty() => {
                Err(ValidationError::Required {
                    field: "requirements",
                })
            }
            Step::Questions if self.session.questions.is_empty() => {
                Err(ValidationError::Required { field: "questions" })
            }
            _ => Ok(()),
        }
    }

    /// Whether reaching the questions step should trigger generation.
    pub fn should_generate_questions(&self) -> bool {
        self.is_new_session && self.session.questions.is_empty()
    }

    /// Moves one step forward, returning the side effects the runtime must perform.
    pub fn advance(&mut self) -> Result<Vec<Command>, WizardError> {
        let to = self.step.next().ok_or(WizardError::AtLastStep(self.step))?;
        if self.step == Step::Answering {
            self.session.backfill_answers();
        }
        self.transition(to)?;

        let mut commands = Vec::new();
        match to {
            Step::Questions if self.should_generate_questions() => {
                commands.push(Command::GenerateQuestions {
                    job_type: self.session.job_type.clone(),
                    requirements: self.session.requirements.clone(),
                });
            }
            Step::Feedback => {
                self.is_new_session = false;
                commands.push(Command::AnalyzeFeedback {
                    questions: self.session.questions.clone(),
                    answers: self.session.answers_in_order(),
                });
            }
            _ => {}
        }
        Ok(commands)
    }

    /// Moves one step back. No data is cleared.
    pub fn retreat(&mut self) -> Result<Step, WizardError> {
        let to = self
            .step
            .previous()
            .ok_or(WizardError::AtFirstStep(self.step))?;
        self.transition(to)?;
        Ok(to)
    }

    /// Starts over from the feedback step with empty data.
    pub fn retake(&mut self) -> Result<Vec<Command>, WizardError> {
        if self.step != Step::Feedback {
            return Err(WizardError::RetakeNotAllowed(self.step));
        }
        self.transition(Step::JobType)?;
        self.session = PracticeSession::default();
        self.is_new_session = true;
        Ok(vec![Command::RefreshCredits])
    }

    fn transition(&mut self, to: Step) -> Result<(), WizardError> {
        if !is_transition_allowed(self.step, to) {
            return Err(WizardError::InvalidTransition {
                from: self.step,
                to,
            });
        }
        debug!(from = %self.step, to = %to, "Wizard transition");
        self.step = to;
        Ok(())
    }

    fn discard_generated(&mut self) {
        self.session.questions.clear();
        self.session.answers.clear();
    }
}
