//! Main Entrypoint for the MockPrep terminal client
//!
//! Loads configuration, initializes logging, signs in when the command needs
//! an account, then either drives the practice wizard interactively or prints
//! usage, credits and service status.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mockprep_client::{config::Config, state::AppState, telemetry};
use mockprep_core::credits::{CreditsStore, DEFAULT_TRANSACTION_PAGE_SIZE};
use mockprep_core::error::WizardError;
use mockprep_core::models::FeedbackReport;
use mockprep_core::practice::Notice;
use mockprep_core::session::UserProfile;
use mockprep_core::wizard::{Step, TOTAL_STEPS};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;

#[derive(Parser)]
#[command(name = "mockprep", version, about = "Practice job interviews from the terminal")]
struct Cli {
    /// Account email. The password is read from MOCKPREP_PASSWORD or prompted for.
    #[arg(long, global = true)]
    email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a practice interview
    Practice {
        #[arg(long)]
        job_type: Option<String>,
        #[arg(long)]
        requirements: Option<String>,
    },
    /// Show this month's interview usage
    Usage,
    /// Inspect and buy interview credits
    Credits {
        #[command(subcommand)]
        action: CreditsCommand,
    },
    /// Check whether the backend is reachable
    Health,
    /// Send a password reset email
    ResetPassword { email: String },
    /// Manage the local question cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CreditsCommand {
    Balance,
    History {
        #[arg(long, default_value_t = DEFAULT_TRANSACTION_PAGE_SIZE)]
        limit: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Packages,
    /// Open a checkout session for a credit package
    Buy { package_size: u32 },
}

#[derive(Subcommand)]
enum CacheCommand {
    Clear,
}

/// Line-oriented stdin reader for the interactive prompts.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, label: &str) -> anyhow::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{}: ", label).as_bytes()).await?;
        stdout.flush().await?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("Input closed"),
        }
    }

    async fn confirm(&mut self, label: &str) -> anyhow::Result<bool> {
        let answer = self.ask(&format!("{} [y/N]", label)).await?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

async fn sign_in(
    state: &AppState,
    email: Option<&str>,
    prompt: &mut Prompt,
) -> anyhow::Result<UserProfile> {
    let email = email.context("This command needs an account; pass --email")?;
    let password = match std::env::var("MOCKPREP_PASSWORD") {
        Ok(password) => password,
        Err(_) => prompt.ask("Password").await?,
    };
    state
        .session
        .sign_in(email, &password)
        .await
        .context("Sign-in failed")
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Warning(message) => println!("! {}", message),
        Notice::QuotaExceeded(message) => println!("Limit reached: {}", message),
        Notice::Error(message) => println!("Error: {}", message),
    }
}

fn print_feedback(report: &FeedbackReport) {
    println!("\nScore: {}/100", report.score);
    println!("{}", report.overall_assessment);
    println!("\nStrengths:");
    for strength in &report.strengths {
        println!("  + {}", strength);
    }
    println!("\nImprovements:");
    for improvement in &report.improvements {
        println!("  - {}", improvement);
    }
    if !report.learning_resources.is_empty() {
        println!("\nLearning resources:");
        for resource in &report.learning_resources {
            match &resource.url {
                Some(url) => println!("  * {} ({})", resource.title, url),
                None => println!("  * {}", resource.title),
            }
        }
    }
}

async fn run_practice(
    state: &AppState,
    prompt: &mut Prompt,
    mut job_type: Option<String>,
    mut requirements: Option<String>,
) -> anyhow::Result<()> {
    let mut flow = state.practice_flow();
    for notice in flow.start().await {
        print_notice(&notice);
    }
    if flow.usage().is_loaded() {
        let usage = flow.usage().stats();
        println!(
            "Interviews this month: {}/{} ({} remaining)",
            usage.current, usage.limit, usage.remaining
        );
    }

    loop {
        let step = flow.wizard().step();
        println!(
            "\n[{}/{}] {} ({:.0}%)",
            step.index() + 1,
            TOTAL_STEPS,
            step,
            flow.wizard().progress_percent()
        );

        match step {
            Step::JobType => {
                let value = match job_type.take() {
                    Some(value) => value,
                    None => prompt.ask("Role you are interviewing for").await?,
                };
                flow.set_job_type(value);
            }
            Step::Requirements => {
                let value = match requirements.take() {
                    Some(value) => value,
                    None => prompt.ask("Key requirements of the role").await?,
                };
                flow.set_requirements(value);
            }
            Step::Questions => {
                if flow.wizard().session().questions.is_empty() {
                    prompt
                        .ask("Questions are not ready yet; press enter to try again")
                        .await?;
                    let report = flow.retry_generation().await;
                    report.notices.iter().for_each(print_notice);
                    continue;
                }
                for (i, question) in flow.wizard().session().questions.iter().enumerate() {
                    println!("  {}. {}", i + 1, question);
                }
                prompt.ask("Press enter to start answering").await?;
            }
            Step::Answering => {
                let questions = flow.wizard().session().questions.clone();
                for (i, question) in questions.iter().enumerate() {
                    println!("\nQ{}. {}", i + 1, question);
                    let answer = prompt.ask("Your answer").await?;
                    if !answer.is_empty() {
                        flow.answer(i, answer)?;
                    }
                }
            }
            Step::Feedback => {
                if let Some(report) = flow.feedback() {
                    print_feedback(report);
                }
                println!("Credits remaining: {}", flow.credits().balance());
                if !prompt.confirm("Practice again with new questions?").await? {
                    break;
                }
                let report = flow.retake().await?;
                report.notices.iter().for_each(print_notice);
                continue;
            }
        }

        let report = match flow.next().await {
            Ok(report) => report,
            Err(WizardError::Validation(e)) => {
                println!("{}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        report.notices.iter().for_each(print_notice);

        if report
            .notices
            .iter()
            .any(|n| matches!(n, Notice::QuotaExceeded(_)))
        {
            prompt.ask("Press enter to dismiss").await?;
            flow.acknowledge_quota();
            println!("Buy credits with `mockprep credits buy <size>` to keep practicing.");
            break;
        }
    }
    Ok(())
}

async fn run_credits(
    state: &AppState,
    user: &UserProfile,
    action: CreditsCommand,
) -> anyhow::Result<()> {
    let backend = state.backend.as_ref();
    let mut credits = CreditsStore::new();
    match action {
        CreditsCommand::Balance => {
            let balance = credits.fetch_credits(backend, &user.uid).await;
            if let Some(error) = &credits.state().error {
                bail!("Failed to fetch credits: {}", error);
            }
            println!("{} credits", balance);
        }
        CreditsCommand::History { limit, page } => {
            let transactions = credits
                .fetch_transactions(backend, &user.uid, limit, page)
                .await
                .context("Failed to fetch transactions")?;
            if transactions.is_empty() {
                println!("No transactions");
            }
            for tx in transactions {
                println!(
                    "{}  {:>+5}  {:?}  {}",
                    tx.created_at.format("%Y-%m-%d %H:%M"),
                    tx.amount,
                    tx.kind,
                    tx.description.unwrap_or_default()
                );
            }
        }
        CreditsCommand::Packages => {
            let packages = credits
                .fetch_packages(backend)
                .await
                .context("Failed to fetch packages")?;
            for size in &packages.available_packages {
                match packages.total_price(*size) {
                    Some(price) => println!("{:>4} credits  {:.2}", size, price),
                    None => println!("{:>4} credits", size),
                }
            }
        }
        CreditsCommand::Buy { package_size } => {
            let session = credits
                .start_checkout(backend, user, package_size)
                .await
                .context("Failed to start checkout")?;
            println!("Complete your purchase at {}", session.url);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    telemetry::init(config.log_level);
    info!(api_url = %config.api_url, "Configuration loaded");

    // --- 3. Build Shared State ---
    let state = AppState::new(config)?;
    let mut prompt = Prompt::new();
    let email = cli.email.as_deref();

    // --- 4. Dispatch ---
    match cli.command {
        Commands::Health => {
            let status = state.backend.health().await.context("Backend unreachable")?;
            println!("{}", status.status);
        }
        Commands::ResetPassword { email } => {
            state
                .session
                .reset_password(&email)
                .await
                .context("Failed to request password reset")?;
            println!("If an account exists for {}, a reset email is on its way.", email);
        }
        Commands::Cache {
            action: CacheCommand::Clear,
        } => {
            let removed = state.cache.len();
            state.cache.clear().context("Failed to clear cache")?;
            println!("Removed {} cached question sets", removed);
        }
        Commands::Practice {
            job_type,
            requirements,
        } => {
            sign_in(&state, email, &mut prompt).await?;
            run_practice(&state, &mut prompt, job_type, requirements).await?;
            state.session.sign_out().await;
        }
        Commands::Usage => {
            sign_in(&state, email, &mut prompt).await?;
            let usage = state
                .backend
                .usage_stats()
                .await
                .context("Failed to fetch usage")?;
            if usage.is_premium {
                println!("Premium account: {} interviews this month", usage.current);
            } else {
                println!(
                    "{}/{} interviews used, {} remaining",
                    usage.current, usage.limit, usage.remaining
                );
            }
            state.session.sign_out().await;
        }
        Commands::Credits { action } => {
            let user = sign_in(&state, email, &mut prompt).await?;
            let result = run_credits(&state, &user, action).await;
            state.session.sign_out().await;
            result?;
        }
    }

    Ok(())
}
