//! Subprocess-backed process host.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::RunnerConfig;
use crate::dispatch::ProcessHost;
use crate::encode::EncodedRequest;
use crate::error::HostError;
use crate::protocol::RawReply;

/// Invokes the shell runner binary once per request, delivering its captured
/// output streams back as the single reply for that dispatch.
pub struct RunnerHost {
    config: RunnerConfig,
}

impl RunnerHost {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProcessHost for RunnerHost {
    async fn invoke(&self, request: &EncodedRequest) -> Result<RawReply, HostError> {
        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args);
        if let Some(limit) = self.config.max_history {
            command.arg("--max-history").arg(limit.to_string());
        }
        command.args(request.to_args());
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.config.program.display(), mode = ?request.mode(), "invoking runner");
        let output = command.output().await.map_err(|source| HostError::Invoke {
            program: self.config.program.display().to_string(),
            source,
        })?;

        Ok(RawReply {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
