//! Mutable per-widget session state.

/// Everything the widget session knows: whether a dispatch is in flight, the
/// last reported shell, the accumulated output log, and the mirrored
/// command history.
///
/// Mutated only by the dispatch controller. The presentation layer reads
/// through [`Session::snapshot`].
#[derive(Debug, Default)]
pub struct Session {
    running: bool,
    shell_name: String,
    output: String,
    history: Vec<String>,
    pending_input: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from the moment a command is dispatched until its terminating
    /// signal (reply, decode failure, or host disconnect) is observed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn shell_name(&self) -> &str {
        &self.shell_name
    }

    pub(crate) fn set_shell(&mut self, shell: impl Into<String>) {
        self.shell_name = shell.into();
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Append text to the output log at line granularity.
    ///
    /// A line break is inserted between a non-empty log and the new text so
    /// two logical lines never run together. Trailing newlines on the
    /// incoming text are dropped; the join supplies them. Empty text is a
    /// no-op.
    pub(crate) fn append_output(&mut self, text: &str) {
        let text = text.trim_end_matches('\n');
        if text.is_empty() {
            return;
        }
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output.push_str(text);
    }

    pub(crate) fn clear_output(&mut self) {
        self.output.clear();
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub(crate) fn replace_history(&mut self, history: Vec<String>) {
        self.history = history;
    }

    /// Stage text to pre-fill the input field, typically the last command
    /// from a history reply.
    pub(crate) fn stage_input(&mut self, text: impl Into<String>) {
        self.pending_input = Some(text.into());
    }

    pub(crate) fn take_pending_input(&mut self) -> Option<String> {
        self.pending_input.take()
    }

    /// Owned copy of the observable state for the presentation layer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            running: self.running,
            shell_name: self.shell_name.clone(),
            output: self.output.clone(),
            history: self.history.clone(),
        }
    }
}

/// Read-only view of a [`Session`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub running: bool,
    pub shell_name: String,
    pub output: String,
    pub history: Vec<String>,
}
