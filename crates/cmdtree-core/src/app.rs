//! The root of a command tree and its `handle` entry point.

use std::sync::Arc;

use cmdtree_argparse::ParsedArgs;
use cmdtree_spec::{CommandSpec, ConfigError, FlagSpec};

use crate::command::Command;
use crate::context::{Environment, ExecutionContext, Logger};
use crate::group::{Flow, Group, Outcome};

/// The application root: a group plus the logger every dispatch reports
/// through.
///
/// A host invokes [`App::handle`] once per external command line. Whether a
/// failed outcome terminates the process is the host's policy; the core
/// only reports the [`Outcome`].
pub struct App {
    root: Group,
    logger: Arc<dyn Logger>,
}

impl App {
    /// An app with no global flags.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            root: Group::new(),
            logger,
        }
    }

    /// An app whose root group consumes `global_flags` before resolving a
    /// command, making them available to every root middleware.
    pub fn with_global_flags(
        logger: Arc<dyn Logger>,
        global_flags: Vec<FlagSpec>,
    ) -> Result<Self, ConfigError> {
        let spec = CommandSpec::define(Vec::new(), global_flags)?;
        Ok(Self {
            root: Group::with_spec(spec)?,
            logger,
        })
    }

    /// Register a top-level command or group.
    pub fn register(&mut self, command: Command) -> Result<&mut Self, ConfigError> {
        self.root.register(command)?;
        Ok(self)
    }

    /// Append a root-level middleware.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&ParsedArgs, &ExecutionContext) -> Flow + Send + Sync + 'static,
    {
        self.root.use_middleware(middleware);
        self
    }

    /// Dispatch one pre-tokenized command line.
    ///
    /// Every call starts from a fresh, empty parent path; command names are
    /// matched case-insensitively while argument values pass through
    /// verbatim.
    pub async fn handle(&self, tokens: &[String], environment: Environment) -> Outcome {
        let ctx = ExecutionContext::new(environment, Arc::clone(&self.logger));
        self.root.dispatch(tokens, ctx).await
    }

    /// Dispatch a raw line, split on whitespace.
    pub async fn handle_line(&self, line: &str, environment: Environment) -> Outcome {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        self.handle(&tokens, environment).await
    }
}
