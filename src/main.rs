//! Learning Assistant
//!
//! Terminal front-end for a personal learning assistant. The note-taking and
//! quizzing happen inside a hosted Claude agent session; this program
//! configures that session, relays prompts and prints the streamed replies.

mod agent;
mod config;
mod session;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::{PermissionMode, ProjectConfig, API_KEY_VAR};
use session::Console;

/// Personal learning assistant
///
/// Take notes, ask about what you learned and get quizzed, backed by a Claude agent
#[derive(Parser, Debug)]
#[command(name = "learning-assistant")]
#[command(version, about, long_about = None)]
struct Args {
    /// Replay the scripted demo instead of chatting
    #[arg(long)]
    demo: bool,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Tool approval mode (default, acceptEdits, plan, bypassPermissions)
    #[arg(long)]
    permission_mode: Option<PermissionMode>,

    /// Maximum agent turns per reply
    #[arg(long)]
    max_turns: Option<u32>,

    /// Working directory for the agent (defaults to the current directory)
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Config file (defaults to .learning-assistant/config.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent runtime executable
    #[arg(long)]
    cli_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ Error: {:#}", e);
            1
        }
    };

    // A pending stdin read would otherwise hold up runtime shutdown
    std::process::exit(code);
}

/// Log to stderr so replies on stdout stay clean; RUST_LOG overrides
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("learning_assistant={}", level)));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Tell the user how to provide the API key; returns the exit code
fn report_missing_api_key(out: &mut impl Write) -> std::io::Result<i32> {
    writeln!(out, "❌ Error: {} not found in environment variables", API_KEY_VAR)?;
    writeln!(out, "Please create a .env file with your API key:")?;
    writeln!(out, "  {}=your_key_here", API_KEY_VAR)?;
    out.flush()?;
    Ok(1)
}

async fn run(args: Args) -> anyhow::Result<i32> {
    info!("Learning Assistant v{}", env!("CARGO_PKG_VERSION"));

    let working_dir = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    if !working_dir.is_dir() {
        bail!("Working directory is not a directory: {}", working_dir.display());
    }

    config::load_dotenv(&working_dir)?;

    if config::api_key().is_err() {
        return report_missing_api_key(&mut std::io::stdout())
            .context("Failed to write to stdout");
    }

    let project = match &args.config {
        Some(path) => ProjectConfig::load_file(path)?,
        None => ProjectConfig::load(&working_dir)?,
    };

    let mut options = project.agent_options(&working_dir);
    if let Some(model) = args.model {
        options = options.with_model(model);
    }
    if let Some(mode) = args.permission_mode {
        options = options.with_permission_mode(mode);
    }
    if let Some(turns) = args.max_turns {
        options.max_turns = Some(turns);
    }
    if let Some(cli_path) = args.cli_path {
        options.cli_path = cli_path;
    }
    let settings = project.session_settings();
    debug!(?options, ?settings, "Resolved configuration");

    let (interrupt_tx, interrupt_rx) = broadcast::channel(4);
    tokio::spawn(async move {
        loop {
            if signal::ctrl_c().await.is_err() {
                break;
            }
            debug!("Received SIGINT (Ctrl+C)");
            let _ = interrupt_tx.send(());
        }
    });

    let mut console = Console::new(
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        interrupt_rx,
    );

    if args.demo {
        session::run_demo(&options, &settings, &mut console).await?;
    } else {
        session::run_interactive(&options, &settings, &mut console).await?;
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["learning-assistant"]).unwrap();
        assert!(!args.demo);
        assert!(!args.verbose);
        assert!(args.model.is_none());
        assert!(args.permission_mode.is_none());
    }

    #[test]
    fn test_args_demo_and_overrides() {
        let args = Args::try_parse_from([
            "learning-assistant",
            "--demo",
            "--model",
            "claude-haiku-test",
            "--permission-mode",
            "acceptEdits",
            "--max-turns",
            "4",
        ])
        .unwrap();
        assert!(args.demo);
        assert_eq!(args.model.as_deref(), Some("claude-haiku-test"));
        assert_eq!(args.permission_mode, Some(PermissionMode::AcceptEdits));
        assert_eq!(args.max_turns, Some(4));
    }

    #[test]
    fn test_missing_api_key_notice() {
        let mut out = Vec::new();
        let code = report_missing_api_key(&mut out).unwrap();
        assert_eq!(code, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "❌ Error: ANTHROPIC_API_KEY not found in environment variables\n\
             Please create a .env file with your API key:\n  \
             ANTHROPIC_API_KEY=your_key_here\n"
        );
    }

    #[test]
    fn test_args_reject_unknown_permission_mode() {
        assert!(Args::try_parse_from(["learning-assistant", "--permission-mode", "nope"]).is_err());
    }
}
