use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use termbuddy_bridge::{Dispatcher, ProcessHost, RunnerConfig, RunnerHost, Signal, Submission};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Minimal interactive front-end for the command bridge. Reads one command
/// per line, prints what the session's output log gained, exits when the
/// runner says so.
#[derive(Parser)]
#[clap(author, version, about = "Interactive front-end for the termbuddy command bridge")]
struct Args {
    /// Path to the shell runner binary.
    #[clap(long, default_value = "termbuddy-runner")]
    runner: PathBuf,

    /// Maximum number of history entries the runner should keep.
    #[clap(long)]
    max_history: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let dispatcher = Dispatcher::new(RunnerHost::new(RunnerConfig {
        program: args.runner,
        args: Vec::new(),
        max_history: args.max_history,
    }));

    // Prime history and shell identity before the first prompt.
    dispatcher.fetch_history().await;
    if let Some(last) = dispatcher.take_pending_input().await {
        eprintln!("(last command: {last})");
    }

    let mut rendered = 0usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&dispatcher).await?;
    while let Some(line) = lines.next_line().await.into_diagnostic()? {
        match dispatcher.submit(&line).await {
            Submission::Completed(Signal::Exit) => break,
            Submission::Completed(Signal::Continue) => {
                render(&dispatcher, &mut rendered).await;
            }
            Submission::Busy | Submission::Ignored => {}
        }
        prompt(&dispatcher).await?;
    }

    Ok(())
}

/// Print whatever the output log gained since the last render.
async fn render<H: ProcessHost>(dispatcher: &Dispatcher<H>, rendered: &mut usize) {
    let snapshot = dispatcher.snapshot().await;
    // The stored offset is only valid for the log it was taken from. If the
    // log was cleared and regrew in the meantime, the offset can land inside
    // a multibyte character; start over from the top in that case.
    let fresh = match snapshot.output.get(*rendered..) {
        Some(fresh) => fresh,
        None => {
            *rendered = 0;
            &snapshot.output
        }
    };
    if !fresh.is_empty() {
        println!("{}", fresh.trim_start_matches('\n'));
    }
    *rendered = snapshot.output.len();
}

async fn prompt<H: ProcessHost>(dispatcher: &Dispatcher<H>) -> Result<()> {
    let snapshot = dispatcher.snapshot().await;
    let shell = if snapshot.shell_name.is_empty() {
        "termbuddy"
    } else {
        &snapshot.shell_name
    };
    eprint!("{shell}> ");
    std::io::stderr().flush().into_diagnostic()?;
    Ok(())
}
