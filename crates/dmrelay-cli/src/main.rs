//! dmrelay - Direct-message dispatch entry point

mod logging;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dmrelay_common::{Config, Error, RawRunRequest, RunRequest};
use dmrelay_core::{Collaborators, Orchestrator, RunReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dmrelay", version, about = "Sequential direct-message dispatch with rate limiting")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a run request document without executing it
    Validate {
        /// JSON input document
        input: PathBuf,
    },

    /// Execute a run and write its report
    Run(RunArgs),

    /// Exercise session setup and authentication without sending
    TestConnection {
        /// Session credential
        #[arg(long, env = "DMRELAY_SESSION_ID", hide_env_values = true)]
        session_id: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// JSON input document; replaces the inline options below
    #[arg(short, long, conflicts_with_all = ["session_id", "usernames", "message"])]
    input_file: Option<PathBuf>,

    /// Session credential
    #[arg(short, long)]
    session_id: Option<String>,

    /// Comma-separated recipients
    #[arg(short, long, value_delimiter = ',')]
    usernames: Option<Vec<String>>,

    /// Message body
    #[arg(short, long)]
    message: Option<String>,

    /// Where to write the run report
    #[arg(short, long, default_value = "output.json")]
    output_file: PathBuf,

    /// Simulate sends instead of delivering them
    #[arg(long)]
    test_mode: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            let code = e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;
    let logging = logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Validate { input } => validate(&input),
        Command::Run(args) => run(args, &config, &logging).await,
        Command::TestConnection { session_id } => test_connection(session_id, &config).await,
    }
}

fn validate(input: &Path) -> anyhow::Result<ExitCode> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request = RunRequest::from_json(&content)?;

    println!("SUCCESS: Input validation successful");
    println!("INFO: Target users: {}", request.usernames().join(", "));
    println!(
        "INFO: Message length: {} characters",
        request.message().chars().count()
    );
    println!(
        "INFO: Caps: {}/hour, {}/day, {}s between messages",
        request.max_messages_per_hour(),
        request.max_messages_per_day(),
        request.delay_between_messages()
    );
    if request.test_mode() {
        println!("INFO: Test mode enabled");
    }

    Ok(ExitCode::SUCCESS)
}

async fn run(
    args: RunArgs,
    config: &Config,
    logging: &logging::LoggingGuard,
) -> anyhow::Result<ExitCode> {
    let mut raw = match &args.input_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<RawRunRequest>(&content)
                .map_err(|e| Error::Validation(format!("Malformed input document: {}", e)))?
        }
        None => RawRunRequest {
            session_id: args.session_id,
            usernames: args.usernames,
            message: args.message,
            ..RawRunRequest::default()
        },
    };
    if args.test_mode {
        raw.test_mode = true;
    }

    let request = RunRequest::validate(raw)?;
    if request.debug_mode() {
        logging.enable_debug();
    }

    let collaborators = Collaborators::from_config(config)?;
    info!(backend = %config.browser.backend, "Collaborators ready");

    let orchestrator = Orchestrator::new(request, &config.dispatch, collaborators);
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let report = orchestrator.run().await;

    write_report(&report, &args.output_file)?;
    print_summary(&report);
    println!("SUCCESS: Results saved to {}", args.output_file.display());

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn test_connection(session_id: String, config: &Config) -> anyhow::Result<ExitCode> {
    let raw = RawRunRequest {
        test_mode: true,
        ..RawRunRequest::new(session_id, vec!["test_user".to_string()], "test")
    };
    let request = RunRequest::validate(raw)?;
    let collaborators = Collaborators::from_config(config)?;

    println!("INFO: Testing connection...");
    let report = Orchestrator::new(request, &config.dispatch, collaborators)
        .run()
        .await;

    if report.success {
        println!("SUCCESS: Connection test successful");
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "ERROR: Connection test failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}

fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn print_summary(report: &RunReport) {
    let summary = report.summary();
    println!("Run summary");
    println!("  Attempted: {}", summary.total_attempted);
    println!("  Sent:      {}", summary.successful_sends);
    println!("  Failed:    {}", summary.failed_sends);
    println!("  Skipped:   {}", summary.skipped_sends);
    println!("  Runtime:   {:.2}s", summary.runtime_seconds);
    if let Some(error) = &report.error {
        println!("  Error:     {}", error);
    }

    for outcome in &report.results {
        match &outcome.error_message {
            Some(error) => println!(
                "  @{:<24} {:<22} {}",
                outcome.username,
                outcome.status.to_string(),
                error
            ),
            None => println!("  @{:<24} {}", outcome.username, outcome.status),
        }
    }
}
