//! devcrew: plan, write and test a small web app with three LLM roles.
//!
//! Runs with no arguments. Configuration comes from `devcrew.toml` (if
//! present) and environment variables; see `devcrew::settings`.
//!
//! Requires an API key for every provider assigned to a role
//! (`ANTHROPIC_API_KEY`, `GOOGLE_API_KEY`, `OPENAI_API_KEY`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devcrew::output::{CREW, Console};
use devcrew::settings::{Settings, Variant, process_env};

#[derive(Parser)]
#[command(name = "devcrew", about = "Architect, developer and QA agents build a small web app")]
struct Args {
    /// Settings file (default: ./devcrew.toml if it exists)
    #[arg(long, env = "DEVCREW_CONFIG")]
    config: Option<PathBuf>,

    /// File containing the goal (default: built-in to-do API goal)
    #[arg(long)]
    goal_file: Option<PathBuf>,

    /// basic or advanced; overrides the settings file
    #[arg(long)]
    variant: Option<Variant>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();

    // JSON logs with DEVCREW_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("DEVCREW_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "devcrew=info".into());
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(variant) = args.variant {
        settings.variant = variant;
    }

    let goal = match &args.goal_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read goal file {}", path.display()))?,
        None => devcrew::DEFAULT_GOAL.to_string(),
    };
    if goal.trim().is_empty() {
        anyhow::bail!("goal is empty");
    }

    let config = settings.resolve(process_env)?;
    let project_dir = config.project_dir.clone();

    tracing::info!(variant = %config.variant, "Kicking off the crew");
    let result = devcrew::run_resolved(&config, &goal, Console::stdout()).await;

    let mut console = Console::stdout();
    match result {
        Ok(outcome) => {
            console.banner("Crew Finished Execution!")?;
            console.status(
                CREW,
                "📦",
                &format!("Final code: {}", outcome.output.path.display()),
            )?;
            if let Some(report) = &outcome.qa {
                console.say(CREW, &format!("QA summary:\n{report}"))?;
            }
            console.say(
                CREW,
                &format!(
                    "Execution finished. Check the '{}' directory for the generated files.",
                    project_dir.display()
                ),
            )?;
            Ok(())
        }
        Err(e) => {
            console.error(CREW, &format!("{:#}", anyhow::Error::from(e)))?;
            console.say(
                CREW,
                &format!(
                    "Execution finished with errors. Check the '{}' directory for any generated files.",
                    project_dir.display()
                ),
            )?;
            std::process::exit(1);
        }
    }
}
