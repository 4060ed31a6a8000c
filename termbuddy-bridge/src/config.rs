use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to invoke the out-of-process shell runner.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Program executed once per round trip.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Extra arguments placed before the request arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Forwarded to the runner as `--max-history` when set.
    #[serde(default)]
    pub max_history: Option<u32>,
}

fn default_program() -> PathBuf {
    PathBuf::from("termbuddy-runner")
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            max_history: None,
        }
    }
}

impl TryFrom<serde_json::Value> for RunnerConfig {
    type Error = serde_json::Error;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        serde_json::from_value(json)
    }
}
