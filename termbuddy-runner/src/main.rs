//! Shell runner for termbuddy.
//!
//! Executes commands on behalf of the widget, persists history, and prints
//! one structured JSON reply per invocation on stdout. The wire contract is
//! defined by `termbuddy_bridge::protocol`.

mod history;
mod shell;

use clap::{ArgGroup, Parser};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::process::Stdio;
use termbuddy_bridge::encode::decode_payload;
use termbuddy_bridge::protocol::{HistoryReply, ReplyAction, RunReply, RunnerReply};
use tokio::process::Command;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::history::{DEFAULT_MAX_HISTORY, History, HistoryStore};
use crate::shell::detect_shell;

#[derive(Parser)]
#[clap(author, version, about = "termbuddy command runner")]
#[clap(group(ArgGroup::new("request").required(true).args(["run", "history"])))]
struct Args {
    /// Execute a command.
    #[clap(long)]
    run: bool,

    /// Base64-encoded, single-quoted command payload.
    #[clap(long, requires = "run")]
    encoded: Option<String>,

    /// Raw command string, used when no encoded payload is given.
    #[clap(long, requires = "run")]
    command: Option<String>,

    /// Return stored history instead of executing anything.
    #[clap(long)]
    history: bool,

    /// Maximum number of history entries to keep.
    #[clap(long, default_value_t = DEFAULT_MAX_HISTORY)]
    max_history: usize,

    /// Override the history file location.
    #[clap(long)]
    history_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = match args.history_file {
        Some(ref path) => HistoryStore::at(path.clone()),
        None => HistoryStore::open(),
    };
    let mut history = store.load();

    let reply = if args.history {
        RunnerReply::History(HistoryReply {
            history: history.history.clone(),
            last_command: Some(history.last_command.clone()),
            shell: Some(detect_shell()),
        })
    } else {
        let command = incoming_command(args.encoded.as_deref(), args.command.as_deref());
        run_command(&command, &mut history, &store, args.max_history).await
    };

    emit(&reply)
}

/// Decode the incoming command, preferring the base64 payload. A malformed
/// payload degrades to an empty command rather than an error.
fn incoming_command(encoded: Option<&str>, command: Option<&str>) -> String {
    if let Some(encoded) = encoded {
        return match decode_payload(encoded) {
            Some(command) => command.trim().to_string(),
            None => {
                warn!("could not decode command payload");
                String::new()
            }
        };
    }
    command.unwrap_or_default().trim().to_string()
}

/// Execute one command and build its reply.
///
/// `clear`/`cls` and `exit`/`quit` are built-ins: they produce the matching
/// action without spawning a shell and without touching stored history, as
/// does an empty command.
async fn run_command(
    command: &str,
    history: &mut History,
    store: &HistoryStore,
    limit: usize,
) -> RunnerReply {
    let shell = detect_shell();
    let action = match command.to_lowercase().as_str() {
        "" => return run_reply(&shell, String::new(), String::new(), None, history),
        "clear" | "cls" => Some(ReplyAction::Clear),
        "exit" | "quit" => Some(ReplyAction::Exit),
        _ => None,
    };
    if action.is_some() {
        return run_reply(&shell, String::new(), String::new(), action, history);
    }

    debug!(%shell, %command, "executing");
    let (stdout, stderr) = execute(&shell, command).await;
    history.record(command, limit);
    store.save(history);
    run_reply(&shell, stdout, stderr, None, history)
}

/// Run the command under the detected shell, capturing both streams. A spawn
/// failure is reported through the reply's stderr, never as a process error.
async fn execute(shell: &str, command: &str) -> (String, String) {
    let result = Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;
    match result {
        Ok(output) => (
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Err(err) => (String::new(), format!("Execution error: {err}")),
    }
}

fn run_reply(
    shell: &str,
    stdout: String,
    stderr: String,
    action: Option<ReplyAction>,
    history: &History,
) -> RunnerReply {
    RunnerReply::Run(RunReply {
        shell: shell.to_string(),
        stdout,
        stderr,
        action,
        history: history.history.clone(),
    })
}

/// Print the reply as a single JSON line on stdout.
fn emit(reply: &RunnerReply) -> Result<()> {
    let payload = serde_json::to_string(reply)
        .into_diagnostic()
        .wrap_err("failed to serialize reply")?;
    println!("{payload}");
    Ok(())
}
