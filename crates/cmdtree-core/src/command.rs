//! Command identity and the leaf/group variant model.

use cmdtree_argparse::{ParsedArgs, generate_usage};
use cmdtree_spec::{CommandSpec, ConfigError};
use futures_util::future::BoxFuture;

use crate::context::{EnvSpec, ExecutionContext};
use crate::group::Group;
use crate::util::is_valid_command_name;

pub type CommandResult = anyhow::Result<()>;

/// The execution capability of a leaf command.
///
/// `run` is only ever invoked with a successful, fully defaulted parse of
/// the command's own spec; its side effects are entirely up to the
/// implementor. The dispatcher awaits the returned future to completion
/// before unwinding.
pub trait Runnable: Send + Sync {
    fn run<'a>(&'a self, args: ParsedArgs, ctx: &'a ExecutionContext) -> BoxFuture<'a, CommandResult>;
}

/// An alternate name for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub show_in_help: bool,
}

impl Alias {
    /// An alias that resolves but stays out of help listings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            show_in_help: false,
        }
    }

    /// An alias listed in help output.
    pub fn shown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            show_in_help: true,
        }
    }
}

/// The two shapes a registered command can take.
pub enum CommandKind {
    /// Terminal command: parses the remaining tokens against its spec and
    /// runs.
    Leaf {
        spec: CommandSpec,
        run: Box<dyn Runnable>,
    },
    /// Nested registry: forwards the remaining tokens to a resolved child.
    Group(Group),
}

/// A named, described unit of execution, owned by exactly one parent
/// registry once registered.
pub struct Command {
    name: String,
    description: String,
    usage: Option<String>,
    aliases: Vec<Alias>,
    allowed_env: EnvSpec,
    kind: CommandKind,
}

impl Command {
    /// Define a terminal command.
    pub fn leaf(
        name: impl Into<String>,
        spec: CommandSpec,
        run: impl Runnable + 'static,
    ) -> Result<Self, ConfigError> {
        spec.validate()?;
        Self::with_kind(
            name.into(),
            CommandKind::Leaf {
                spec,
                run: Box::new(run),
            },
        )
    }

    /// Wrap a group as a registrable command.
    pub fn group(name: impl Into<String>, group: Group) -> Result<Self, ConfigError> {
        Self::with_kind(name.into(), CommandKind::Group(group))
    }

    fn with_kind(name: String, kind: CommandKind) -> Result<Self, ConfigError> {
        if !is_valid_command_name(&name) {
            return Err(ConfigError::invalid_name(format!(
                "Invalid command name: '{name}'"
            )));
        }
        Ok(Self {
            name,
            description: String::from("No description provided."),
            usage: None,
            aliases: Vec::new(),
            allowed_env: EnvSpec::All,
            kind,
        })
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Override the generated usage string.
    pub fn usage(mut self, text: impl Into<String>) -> Self {
        self.usage = Some(text.into());
        self
    }

    pub fn alias(mut self, alias: Alias) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn environment(mut self, allowed_env: EnvSpec) -> Self {
        self.allowed_env = allowed_env;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn allowed_env(&self) -> EnvSpec {
        self.allowed_env
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    /// The argument schema this command parses its own tokens against.
    pub fn spec(&self) -> &CommandSpec {
        match &self.kind {
            CommandKind::Leaf { spec, .. } => spec,
            CommandKind::Group(group) => group.spec(),
        }
    }

    /// The usage string shown in sub-command help: the explicit override if
    /// set, the generated rendering of the spec otherwise.
    pub(crate) fn usage_line(&self) -> String {
        match &self.usage {
            Some(usage) => usage.clone(),
            None => generate_usage(self.spec()),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            CommandKind::Leaf { .. } => "Leaf",
            CommandKind::Group(_) => "Group",
        };
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}
