/// Outcome of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnStatus {
    /// Finished and produced output
    SuccessFinishResult,
    /// Finished without output
    #[default]
    SuccessFinishNoResult,
    Failed,
}

/// Output, error and status a command reports back to the interpreter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReturn {
    status: ReturnStatus,
    output: String,
    error: Option<String>,
}

impl CommandReturn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line of output
    pub fn append_message(&mut self, line: impl AsRef<str>) {
        self.output.push_str(line.as_ref());
        self.output.push('\n');
    }

    /// Record an error and mark the command failed
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status = ReturnStatus::Failed;
    }

    pub fn set_status(&mut self, status: ReturnStatus) {
        self.status = status;
    }

    pub fn status(&self) -> ReturnStatus {
        self.status
    }

    pub fn succeeded(&self) -> bool {
        self.status != ReturnStatus::Failed
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output split into lines
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
