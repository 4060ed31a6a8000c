//! Wire contract with the out-of-process shell runner.
//!
//! The runner prints one UTF-8 reply per invocation on stdout, normally a
//! JSON object discriminated by a `type` field. Anything that does not parse
//! as one of the known shapes is surfaced verbatim instead of being dropped.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Raw capture of one runner invocation: both output streams, delivered
/// exactly once per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReply {
    pub stdout: String,
    pub stderr: String,
}

/// Control action requested by a run reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyAction {
    /// Wipe the output log.
    Clear,
    /// Tear down the surrounding widget session.
    Exit,
}

/// Decode an optional action string, treating unrecognized values as absent.
/// A novel action must never knock an otherwise valid reply down to raw text.
fn lenient_action<'de, D>(deserializer: D) -> Result<Option<ReplyAction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        Some("clear") => Some(ReplyAction::Clear),
        Some("exit") => Some(ReplyAction::Exit),
        Some(other) => {
            debug!(action = other, "ignoring unrecognized reply action");
            None
        }
        None => None,
    })
}

/// Outcome of executing (or short-circuiting) one command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReply {
    #[serde(default)]
    pub shell: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(
        default,
        deserialize_with = "lenient_action",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<ReplyAction>,
    #[serde(default)]
    pub history: Vec<String>,
}

/// Stored history, returned for the bootstrap fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryReply {
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

/// A structured reply from the runner, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RunnerReply {
    Run(RunReply),
    History(HistoryReply),
}

/// Decoded form of one reply's stdout. Exactly one variant per reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMessage {
    Run(RunReply),
    History(HistoryReply),
    /// stdout that was not a structured reply, surfaced verbatim.
    RawText(String),
}

/// Parse one invocation's stdout.
///
/// Empty stdout carries no message. Malformed or non-JSON stdout is never an
/// error here; it degrades to [`ResponseMessage::RawText`].
pub fn decode(stdout: &str) -> Option<ResponseMessage> {
    if stdout.is_empty() {
        return None;
    }
    match serde_json::from_str::<RunnerReply>(stdout) {
        Ok(RunnerReply::Run(run)) => Some(ResponseMessage::Run(run)),
        Ok(RunnerReply::History(history)) => Some(ResponseMessage::History(history)),
        Err(err) => {
            debug!(%err, "stdout is not a structured reply, degrading to raw text");
            Some(ResponseMessage::RawText(stdout.to_string()))
        }
    }
}
