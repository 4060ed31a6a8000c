use crate::config::RunnerConfig;
use crate::dispatch::{Dispatcher, ProcessHost, Signal, Submission};
use crate::encode::EncodedRequest;
use crate::error::HostError;
use crate::host::RunnerHost;
use crate::protocol::RawReply;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Host canned with a fixed sequence of replies, recording every invocation.
struct CannedHost {
    replies: Mutex<VecDeque<Result<RawReply, HostError>>>,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl CannedHost {
    fn new(replies: Vec<Result<RawReply, HostError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// One reply whose stdout is the given JSON value.
    fn json(stdout: serde_json::Value) -> Self {
        Self::new(vec![Ok(RawReply {
            stdout: stdout.to_string(),
            stderr: String::new(),
        })])
    }

    fn raw(stdout: &str, stderr: &str) -> Self {
        Self::new(vec![Ok(RawReply {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })])
    }

    fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessHost for CannedHost {
    async fn invoke(&self, request: &EncodedRequest) -> Result<RawReply, HostError> {
        self.invocations.lock().unwrap().push(request.to_args());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(disconnect()))
    }
}

/// Host whose reply is gated on a semaphore, keeping a dispatch in flight
/// until the test releases it.
struct GatedHost {
    gate: Arc<Semaphore>,
    reply: RawReply,
}

#[async_trait]
impl ProcessHost for GatedHost {
    async fn invoke(&self, _request: &EncodedRequest) -> Result<RawReply, HostError> {
        let _permit = self.gate.acquire().await.expect("gate closed");
        Ok(self.reply.clone())
    }
}

fn disconnect() -> HostError {
    HostError::Invoke {
        program: "test-runner".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "runner went away"),
    }
}

fn dispatcher_with_json(stdout: serde_json::Value) -> Dispatcher<Arc<CannedHost>> {
    Dispatcher::new(Arc::new(CannedHost::json(stdout)))
}

#[tokio::test]
async fn end_to_end_run_round_trip() {
    let host = Arc::new(CannedHost::json(json!({
        "type": "run",
        "shell": "bash",
        "stdout": "hi\n",
        "history": ["echo hi"],
    })));
    let dispatcher = Dispatcher::new(host.clone());

    assert_eq!(
        dispatcher.submit("echo hi").await,
        Submission::Completed(Signal::Continue)
    );

    assert_eq!(
        host.invocations(),
        vec![vec![
            "--run".to_string(),
            "--encoded".to_string(),
            STANDARD.encode("'echo hi'"),
        ]]
    );

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "> echo hi\nhi");
    assert_eq!(snapshot.shell_name, "bash");
    assert_eq!(snapshot.history, vec!["echo hi".to_string()]);
    assert!(!snapshot.running);
}

#[tokio::test]
async fn empty_submissions_never_dispatch() {
    let host = Arc::new(CannedHost::new(Vec::new()));
    let dispatcher = Dispatcher::new(host.clone());

    assert_eq!(dispatcher.submit("").await, Submission::Ignored);
    assert_eq!(dispatcher.submit("   \t  ").await, Submission::Ignored);

    assert_eq!(host.invocations(), Vec::<Vec<String>>::new());
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "");
    assert!(!snapshot.running);
}

#[tokio::test]
async fn submissions_while_busy_are_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let host = GatedHost {
        gate: gate.clone(),
        reply: RawReply {
            stdout: json!({"type": "run", "shell": "sh", "stdout": "done", "history": []})
                .to_string(),
            stderr: String::new(),
        },
    };
    let dispatcher = Arc::new(Dispatcher::new(host));

    let first = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.submit("slow").await })
    };
    while !dispatcher.snapshot().await.running {
        tokio::task::yield_now().await;
    }

    let output_before = dispatcher.snapshot().await.output;
    assert_eq!(dispatcher.submit("too eager").await, Submission::Busy);
    assert_eq!(dispatcher.fetch_history().await, Submission::Busy);
    assert_eq!(dispatcher.snapshot().await.output, output_before);

    gate.add_permits(1);
    assert_eq!(
        first.await.unwrap(),
        Submission::Completed(Signal::Continue)
    );
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "> slow\ndone");
    assert!(!snapshot.running);
}

#[tokio::test]
async fn malformed_stdout_is_shown_verbatim() {
    let dispatcher = Dispatcher::new(Arc::new(CannedHost::raw("{not json", "oops")));
    dispatcher.submit("true").await;

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "> true\n{not json\noops");
    assert_eq!(snapshot.shell_name, "");
    assert_eq!(snapshot.history, Vec::<String>::new());
    assert!(!snapshot.running);
}

#[tokio::test]
async fn stderr_is_surfaced_after_stdout_content() {
    let host = Arc::new(CannedHost::new(vec![Ok(RawReply {
        stdout: json!({"type": "run", "shell": "sh", "stdout": "out", "history": []}).to_string(),
        stderr: "late warning".to_string(),
    })]));
    let dispatcher = Dispatcher::new(host);
    dispatcher.submit("make").await;

    assert_eq!(dispatcher.snapshot().await.output, "> make\nout\nlate warning");
}

#[tokio::test]
async fn clear_action_wipes_the_log_after_appends() {
    let dispatcher = dispatcher_with_json(json!({
        "type": "run",
        "shell": "sh",
        "stdout": "about to vanish",
        "stderr": "this too",
        "action": "clear",
        "history": ["clear"],
    }));
    dispatcher.submit("clear").await;

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "");
    // the rest of the reply still applies
    assert_eq!(snapshot.shell_name, "sh");
    assert_eq!(snapshot.history, vec!["clear".to_string()]);
}

#[tokio::test]
async fn run_stdout_without_clear_survives() {
    let dispatcher = dispatcher_with_json(json!({
        "type": "run",
        "shell": "sh",
        "stdout": "kept",
        "history": [],
    }));
    dispatcher.submit("keep").await;
    assert_eq!(dispatcher.snapshot().await.output, "> keep\nkept");
}

#[tokio::test]
async fn exit_action_signals_teardown() {
    let dispatcher = dispatcher_with_json(json!({
        "type": "run",
        "shell": "sh",
        "action": "exit",
        "history": [],
    }));
    assert_eq!(
        dispatcher.submit("exit").await,
        Submission::Completed(Signal::Exit)
    );
    assert!(!dispatcher.snapshot().await.running);
}

#[tokio::test]
async fn disconnect_returns_to_idle_without_mutation() {
    let dispatcher = Dispatcher::new(Arc::new(CannedHost::new(vec![Err(disconnect())])));
    assert_eq!(
        dispatcher.submit("doomed").await,
        Submission::Completed(Signal::Continue)
    );

    let snapshot = dispatcher.snapshot().await;
    // the prompt line was already appended on dispatch and stays
    assert_eq!(snapshot.output, "> doomed");
    assert!(!snapshot.running);

    // the session is usable again
    let dispatcher = dispatcher_with_json(json!({"type": "run", "shell": "sh", "history": []}));
    assert_eq!(
        dispatcher.submit("next").await,
        Submission::Completed(Signal::Continue)
    );
}

#[tokio::test]
async fn bootstrap_primes_history_without_output() {
    let host = Arc::new(CannedHost::json(json!({
        "type": "history",
        "history": ["ls", "pwd"],
        "last_command": "pwd",
        "shell": "/bin/zsh",
    })));
    let dispatcher = Dispatcher::new(host.clone());

    assert_eq!(
        dispatcher.fetch_history().await,
        Submission::Completed(Signal::Continue)
    );
    assert_eq!(host.invocations(), vec![vec!["--history".to_string()]]);

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "");
    assert_eq!(snapshot.history, vec!["ls".to_string(), "pwd".to_string()]);
    assert_eq!(snapshot.shell_name, "/bin/zsh");
    assert_eq!(dispatcher.take_pending_input().await.as_deref(), Some("pwd"));
    assert_eq!(dispatcher.take_pending_input().await, None);
}

#[tokio::test]
async fn bootstrap_failure_is_non_fatal() {
    let dispatcher = Dispatcher::new(Arc::new(CannedHost::new(vec![Err(disconnect())])));
    assert_eq!(
        dispatcher.fetch_history().await,
        Submission::Completed(Signal::Continue)
    );

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "");
    assert_eq!(snapshot.history, Vec::<String>::new());
    assert!(!snapshot.running);
}

#[tokio::test]
async fn empty_last_command_is_not_staged() {
    let dispatcher = dispatcher_with_json(json!({
        "type": "history",
        "history": [],
        "last_command": "",
    }));
    dispatcher.fetch_history().await;
    assert_eq!(dispatcher.take_pending_input().await, None);
}

#[tokio::test]
async fn clear_is_independent_of_dispatch_state() {
    let dispatcher = dispatcher_with_json(json!({
        "type": "run",
        "shell": "sh",
        "stdout": "text",
        "history": [],
    }));
    dispatcher.submit("emit").await;
    assert_eq!(dispatcher.snapshot().await.output, "> emit\ntext");

    dispatcher.clear().await;
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "");
    // shell identity and history are untouched by clear
    assert_eq!(snapshot.shell_name, "sh");
}

// Round trips through a real subprocess, with shell scripts standing in
// for the runner.

fn create_script(script: &str) -> std::io::Result<tempfile::TempPath> {
    let mut temp_file = tempfile::Builder::new()
        .prefix("fake-runner")
        .suffix(".sh")
        .tempfile()?;
    temp_file.write_all(script.as_bytes())?;
    temp_file
        .as_file_mut()
        .set_permissions(std::fs::Permissions::from_mode(0o755))?;
    Ok(temp_file.into_temp_path())
}

#[tokio::test]
async fn runner_host_round_trip() {
    let script = create_script(
        "#!/bin/sh\necho '{\"type\":\"run\",\"shell\":\"sh\",\"stdout\":\"hi\",\"history\":[\"echo hi\"]}'",
    )
    .unwrap();
    let dispatcher = Dispatcher::new(RunnerHost::new(RunnerConfig {
        program: script.to_path_buf(),
        args: Vec::new(),
        max_history: None,
    }));

    assert_eq!(
        dispatcher.submit("echo hi").await,
        Submission::Completed(Signal::Continue)
    );
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "> echo hi\nhi");
    assert_eq!(snapshot.shell_name, "sh");
    assert_eq!(snapshot.history, vec!["echo hi".to_string()]);
}

#[tokio::test]
async fn runner_host_forwards_arguments_in_order() {
    // the fake runner echoes its argv back through the reply's stdout field
    let script = create_script(
        "#!/bin/sh\nprintf '{\"type\":\"run\",\"shell\":\"sh\",\"stdout\":\"%s\",\"history\":[]}\\n' \"$*\"",
    )
    .unwrap();
    let dispatcher = Dispatcher::new(RunnerHost::new(RunnerConfig {
        program: script.to_path_buf(),
        args: vec!["--quiet".to_string()],
        max_history: Some(5),
    }));

    dispatcher.submit("echo hi").await;
    let expected = format!(
        "> echo hi\n--quiet --max-history 5 --run --encoded {}",
        STANDARD.encode("'echo hi'")
    );
    assert_eq!(dispatcher.snapshot().await.output, expected);
}

#[tokio::test]
async fn runner_host_missing_binary_is_a_disconnect() {
    let dispatcher = Dispatcher::new(RunnerHost::new(RunnerConfig {
        program: "/nonexistent/termbuddy-runner".into(),
        args: Vec::new(),
        max_history: None,
    }));

    assert_eq!(
        dispatcher.submit("true").await,
        Submission::Completed(Signal::Continue)
    );
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.output, "> true");
    assert!(!snapshot.running);
}

#[tokio::test]
async fn runner_host_surfaces_stderr_noise() {
    let script = create_script("#!/bin/sh\necho 'traceback: it broke' >&2\nexit 1").unwrap();
    let dispatcher = Dispatcher::new(RunnerHost::new(RunnerConfig {
        program: script.to_path_buf(),
        args: Vec::new(),
        max_history: None,
    }));

    dispatcher.submit("whatever").await;
    assert_eq!(
        dispatcher.snapshot().await.output,
        "> whatever\ntraceback: it broke"
    );
}
