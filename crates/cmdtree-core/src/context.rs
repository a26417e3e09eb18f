//! Execution environment, logging capability, and per-invocation context.

use std::sync::{Arc, Mutex};

use crate::util::parent_path_string;

/// The environment a dispatch runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// A one-shot shell invocation (terminal, script).
    Shell,
    /// An interactive runtime console inside a running application.
    Runtime,
}

/// Where a command is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvSpec {
    #[default]
    All,
    Shell,
    Runtime,
}

impl EnvSpec {
    pub fn allows(self, environment: Environment) -> bool {
        match self {
            Self::All => true,
            Self::Shell => environment == Environment::Shell,
            Self::Runtime => environment == Environment::Runtime,
        }
    }
}

/// Text sink for everything the dispatcher reports: help listings,
/// not-found messages, parse errors. The core always passes fully formatted
/// strings; the transport (console, file, buffer) is the implementor's
/// concern.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards messages to `tracing` events at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Collects messages in memory, for tests and for hosts that present
/// dispatcher output themselves.
#[derive(Debug, Default)]
pub struct BufferLogger {
    lines: Mutex<Vec<String>>,
}

impl BufferLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}

impl Logger for BufferLogger {
    fn debug(&self, message: &str) {
        self.push(message);
    }

    fn info(&self, message: &str) {
        self.push(message);
    }

    fn warn(&self, message: &str) {
        self.push(message);
    }

    fn error(&self, message: &str) {
        self.push(message);
    }
}

/// Per-invocation dispatch state threaded down the recursion.
///
/// Each resolved child receives a fresh copy with its name appended, so
/// sibling dispatches never observe each other's path segments and every
/// top-level handle starts from an empty path.
#[derive(Clone)]
pub struct ExecutionContext {
    pub environment: Environment,
    pub logger: Arc<dyn Logger>,
    parent_path: Vec<String>,
}

impl ExecutionContext {
    pub fn new(environment: Environment, logger: Arc<dyn Logger>) -> Self {
        Self {
            environment,
            logger,
            parent_path: Vec::new(),
        }
    }

    /// The command-name tokens resolved so far.
    pub fn parent_path(&self) -> &[String] {
        &self.parent_path
    }

    /// The path rendered as a message prefix (trailing space included).
    pub fn path_string(&self) -> String {
        parent_path_string(&self.parent_path)
    }

    /// A copy of this context with one more resolved segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut parent_path = self.parent_path.clone();
        parent_path.push(segment.to_string());
        Self {
            environment: self.environment,
            logger: Arc::clone(&self.logger),
            parent_path,
        }
    }
}
