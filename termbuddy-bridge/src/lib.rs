//! Command-execution bridge between the termbuddy widget and its
//! out-of-process shell runner.
//!
//! The bridge encodes a user-typed command line for transport, hands it to a
//! [`ProcessHost`] for a single invocation of the runner, decodes the
//! structured reply, and reconciles it with the locally held session state
//! (running flag, shell identity, output log, history). Presentation is an
//! external collaborator: it calls [`Dispatcher::submit`] and
//! [`Dispatcher::clear`], and observes [`SessionSnapshot`]s.

pub mod config;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod host;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod tests;

pub use config::RunnerConfig;
pub use dispatch::{Dispatcher, ProcessHost, Signal, Submission};
pub use encode::{EncodedRequest, RequestMode, encode};
pub use error::{EncodeError, HostError};
pub use host::RunnerHost;
pub use protocol::{
    HistoryReply, RawReply, ReplyAction, ResponseMessage, RunReply, RunnerReply, decode,
};
pub use session::{Session, SessionSnapshot};
