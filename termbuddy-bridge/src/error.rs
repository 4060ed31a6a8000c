use miette::Diagnostic;
use thiserror::Error;

/// Violations of the encoder contract.
///
/// Empty user input is filtered out at the submission boundary, so hitting
/// this means an internal caller skipped the guard.
#[derive(Error, Diagnostic, Debug)]
pub enum EncodeError {
    #[error("refusing to encode an empty command for a run request")]
    EmptyCommand,
}

/// Failures of the process host before a usable reply was produced.
///
/// The dispatch controller treats every variant as a disconnect: the
/// in-flight round trip completes and the session returns to idle.
#[derive(Error, Diagnostic, Debug)]
pub enum HostError {
    #[error("failed to invoke runner {program}: {source}")]
    Invoke {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
