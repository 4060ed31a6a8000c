//! One-at-a-time request/reply round trips against the process host.
//!
//! The controller owns the session and is its only writer. A dispatch is
//! strictly serialized: the busy flag is raised before the host is invoked
//! and dropped only when the invocation's single reply (or its disconnect)
//! has been applied, so replies can never interleave across commands.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::encode::{self, EncodedRequest, RequestMode};
use crate::error::HostError;
use crate::protocol::{self, RawReply, ReplyAction, ResponseMessage};
use crate::session::{Session, SessionSnapshot};

/// The mechanism that invokes the external runner and captures its output.
///
/// One invocation yields exactly one reply. `Err` means the host
/// disconnected before producing anything usable.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    async fn invoke(&self, request: &EncodedRequest) -> Result<RawReply, HostError>;
}

#[async_trait]
impl<H: ProcessHost> ProcessHost for std::sync::Arc<H> {
    async fn invoke(&self, request: &EncodedRequest) -> Result<RawReply, HostError> {
        (**self).invoke(request).await
    }
}

/// Outcome of handing one command line to [`Dispatcher::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The round trip completed and the session is idle again.
    Completed(Signal),
    /// A dispatch was already in flight; the command was dropped.
    Busy,
    /// Empty or whitespace-only input; nothing was dispatched.
    Ignored,
}

/// Control signal surfaced to the embedding widget after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    /// Keep the session alive.
    #[default]
    Continue,
    /// The runner asked for the surrounding widget to be torn down.
    Exit,
}

/// Orchestrates round trips and reconciles replies into the session.
pub struct Dispatcher<H> {
    host: H,
    session: Arc<RwLock<Session>>,
}

impl<H: ProcessHost> Dispatcher<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            session: Arc::new(RwLock::new(Session::new())),
        }
    }

    /// Shared handle to the session. Mutation stays inside this crate; the
    /// presentation layer can only read through it.
    pub fn session(&self) -> Arc<RwLock<Session>> {
        self.session.clone()
    }

    /// Owned copy of the observable state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    /// Dispatch one user command through the runner.
    ///
    /// Guards at the boundary: whitespace-only input is ignored, and while a
    /// dispatch is in flight further submissions are dropped silently. On
    /// dispatch the prompt line `> command` is appended to the output log.
    #[instrument(skip(self, command))]
    pub async fn submit(&self, command: &str) -> Submission {
        let command = command.trim();
        let Ok(request) = encode::encode(command, RequestMode::Run) else {
            return Submission::Ignored;
        };
        {
            let mut session = self.session.write().await;
            if session.is_running() {
                debug!("dispatch already in flight, dropping submission");
                return Submission::Busy;
            }
            session.set_running(true);
            session.append_output(&format!("> {command}"));
        }
        Submission::Completed(self.round_trip(&request).await)
    }

    /// Prime history and shell identity with one history-fetch round trip.
    ///
    /// Runs through the same dispatch path as user commands and is subject
    /// to the same single-flight guard. Failure is non-fatal: the session
    /// simply keeps its empty history.
    #[instrument(skip(self))]
    pub async fn fetch_history(&self) -> Submission {
        {
            let mut session = self.session.write().await;
            if session.is_running() {
                debug!("dispatch already in flight, dropping history fetch");
                return Submission::Busy;
            }
            session.set_running(true);
        }
        Submission::Completed(self.round_trip(&EncodedRequest::history_fetch()).await)
    }

    /// Wipe the output log. Independent of dispatch state; an in-flight
    /// round trip is unaffected.
    pub async fn clear(&self) {
        self.session.write().await.clear_output();
    }

    /// Take the staged pre-fill for the input field, if a history reply
    /// provided one.
    pub async fn take_pending_input(&self) -> Option<String> {
        self.session.write().await.take_pending_input()
    }

    /// Await the host's single reply and apply it. Always returns the
    /// session to idle.
    async fn round_trip(&self, request: &EncodedRequest) -> Signal {
        let reply = self.host.invoke(request).await;
        let mut session = self.session.write().await;
        let signal = match reply {
            Ok(raw) => apply_reply(&mut session, &raw),
            Err(err) => {
                // Host-level failure is the terminating signal for this
                // dispatch; whatever already reached the log stays there.
                warn!(%err, "process host disconnected without a usable reply");
                Signal::Continue
            }
        };
        session.set_running(false);
        signal
    }
}

/// Reconcile one raw reply into the session.
///
/// stdout-derived content lands first, then the capture channel's stderr.
/// A `clear` action is applied after all appends, so a clearing reply
/// always leaves an empty log.
fn apply_reply(session: &mut Session, raw: &RawReply) -> Signal {
    let mut signal = Signal::Continue;
    let mut clear_requested = false;

    match protocol::decode(&raw.stdout) {
        Some(ResponseMessage::Run(run)) => {
            if !run.shell.is_empty() {
                session.set_shell(run.shell);
            }
            session.append_output(&run.stdout);
            session.append_output(&run.stderr);
            match run.action {
                Some(ReplyAction::Clear) => clear_requested = true,
                Some(ReplyAction::Exit) => signal = Signal::Exit,
                None => {}
            }
            session.replace_history(run.history);
        }
        Some(ResponseMessage::History(history)) => {
            session.replace_history(history.history);
            if let Some(last) = history.last_command
                && !last.is_empty()
            {
                session.stage_input(last);
            }
            if let Some(shell) = history.shell {
                session.set_shell(shell);
            }
        }
        Some(ResponseMessage::RawText(text)) => session.append_output(&text),
        None => {}
    }

    // stderr is never interpreted as structured data.
    session.append_output(&raw.stderr);

    if clear_requested {
        session.clear_output();
    }
    signal
}
