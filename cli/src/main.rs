//! CLI for the Dockerfile image updater.
//!
//! Finds Dockerfiles referencing a base image across GitHub, forks the
//! owning repositories, updates the image tag and opens pull requests
//! upstream.

use clap::Parser;
use dockerfile_image_update::{RunSummary, Runner, RunnerConfig, RunnerError};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dockerfile Image Update - update base image references across repositories via forks and pull requests.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the base image to update references to.
    #[arg(long)]
    image: String,

    /// Tag the image should be moved to.
    #[arg(long)]
    tag: String,

    /// Repository holding the image-to-tag store, in "owner/name" form.
    #[arg(long)]
    store: String,

    /// GitHub Personal Access Token.
    #[arg(long, env = "GITHUB_TOKEN")]
    token: String,

    /// Restrict the search to a single organization.
    #[arg(long)]
    org: Option<String>,

    /// Branch to update instead of each fork's default branch.
    #[arg(long)]
    branch: Option<String>,

    /// Title for the pull requests that are opened.
    #[arg(long)]
    pull_request_message: Option<String>,

    /// Commit message used when rewriting Dockerfiles.
    #[arg(long)]
    comment: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    init_tracing();

    // Parse arguments
    let args = Args::parse();

    // Run the main logic
    match run(args).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::from(0)
        }
        Err(e @ RunnerError::Updates { .. }) => {
            error!(error = %e, "Run finished with failures");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        // Use compact formatting without module target paths for cleaner output
        .with(fmt::layer().compact().with_target(false))
        // Allow runtime log filtering via RUST_LOG env var (e.g., RUST_LOG=debug)
        // Falls back to "info" level if RUST_LOG is not set or invalid
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        // Register as the global default subscriber
        .init();
}

/// Main execution logic.
async fn run(args: Args) -> Result<RunSummary, RunnerError> {
    let mut config = RunnerConfig::new(args.image, args.tag, args.store, args.token);
    if let Some(org) = args.org {
        config = config.with_org(org);
    }
    if let Some(branch) = args.branch {
        config = config.with_branch(branch);
    }
    if let Some(message) = args.pull_request_message {
        config = config.with_pull_request_message(message);
    }
    if let Some(comment) = args.comment {
        config = config.with_commit_comment(comment);
    }
    let runner = Runner::new(config)?;
    runner.run().await
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    println!("  Dockerfiles matched: {}", summary.files_matched);
    println!("  Repositories forked: {}", summary.repositories_forked);
    println!("  Repositories updated: {}", summary.repositories_updated);
    println!("  Repositories skipped: {}", summary.repositories_skipped);
    println!("  Repositories failed: {}", summary.repositories_failed);
}
