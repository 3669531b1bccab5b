use crate::cli::Command;

/// Execution contexts that influence how console logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Output goes to files; the console is free for logs.
    LocalDev,
    /// The document or DOT text is streamed to stdout and must stay clean.
    Piped,
}

impl ExecutionContext {
    /// Returns `true` when logs must never reach stdout.
    pub fn protects_stdout(self) -> bool {
        matches!(self, ExecutionContext::Piped)
    }
}

/// Derive the active execution context from a parsed CLI command.
pub fn detect_context(command: &Command) -> ExecutionContext {
    if command.writes_stdout() {
        ExecutionContext::Piped
    } else {
        ExecutionContext::LocalDev
    }
}
