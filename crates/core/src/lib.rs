pub mod cache;
pub mod credits;
pub mod error;
pub mod guard;
pub mod models;
pub mod ports;
pub mod practice;
pub mod session;
pub mod usage;
pub mod wizard;

/// Side effects the practice wizard asks its runtime to carry out.
///
/// The wizard only decides *what* should happen when a step changes; the
/// practice flow (or any other runtime) performs the network calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Produce interview questions for the given role and requirements.
    GenerateQuestions {
        job_type: String,
        requirements: String,
    },
    /// Score the answers. `answers` is aligned with `questions`.
    AnalyzeFeedback {
        questions: Vec<String>,
        answers: Vec<String>,
    },
    /// Re-read the credit balance from the backend.
    RefreshCredits,
}
