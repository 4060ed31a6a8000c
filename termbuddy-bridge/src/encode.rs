//! Transport encoding for commands handed to the shell runner.
//!
//! A command crosses two argument-parsing layers on its way to the shell:
//! the runner's own command line and the shell invocation inside it. The
//! text is first wrapped in single quotes so the shell receives it as one
//! literal word, then base64-encoded so the quoted form survives the
//! runner's command line as a single argument.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::EncodeError;

/// Execution mode for one runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Execute a user command.
    Run,
    /// Fetch stored history without executing anything.
    HistoryFetch,
}

/// A command prepared for hand-off to the process host.
///
/// Owned by the in-flight dispatch and discarded once the host accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedRequest {
    /// `--run --encoded <B64>` where `<B64>` is the base64 of the
    /// single-quoted command text.
    Run { encoded: String },
    /// `--history`, the bootstrap request.
    HistoryFetch,
}

impl EncodedRequest {
    pub fn history_fetch() -> Self {
        EncodedRequest::HistoryFetch
    }

    pub fn mode(&self) -> RequestMode {
        match self {
            EncodedRequest::Run { .. } => RequestMode::Run,
            EncodedRequest::HistoryFetch => RequestMode::HistoryFetch,
        }
    }

    /// The arguments the runner is invoked with for this request.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            EncodedRequest::Run { encoded } => vec![
                "--run".to_string(),
                "--encoded".to_string(),
                encoded.clone(),
            ],
            EncodedRequest::HistoryFetch => vec!["--history".to_string()],
        }
    }
}

/// Encode a command for transport.
///
/// `command` may be empty only in [`RequestMode::HistoryFetch`], which
/// ignores it entirely. Pure function of its input.
pub fn encode(command: &str, mode: RequestMode) -> Result<EncodedRequest, EncodeError> {
    match mode {
        RequestMode::HistoryFetch => Ok(EncodedRequest::HistoryFetch),
        RequestMode::Run => {
            if command.trim().is_empty() {
                return Err(EncodeError::EmptyCommand);
            }
            Ok(EncodedRequest::Run {
                encoded: STANDARD.encode(single_quote(command)),
            })
        }
    }
}

/// Wrap text as a single-quoted shell word.
///
/// Every embedded single quote becomes `'\''` (close, escaped quote,
/// reopen). The text is always wrapped, so no knowledge of which characters
/// the shell treats specially is needed.
pub fn single_quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Strip the quoting applied by [`single_quote`].
///
/// Returns `None` when the text is not a single-quoted word. Inside the
/// quotes every `'` originates from an escape sequence, so a plain
/// replacement recovers the original text exactly.
pub fn single_unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("'\\''", "'"))
}

/// Recover the command text from a `--encoded` payload on the runner side.
///
/// Inverse of [`encode`]: the base64 layer, then the quote layer. Invalid
/// UTF-8 inside the payload is replaced rather than rejected.
pub fn decode_payload(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded).ok()?;
    single_unquote(&String::from_utf8_lossy(&bytes))
}
