//! Group registry, middleware chain, and the recursive dispatch engine.

use std::sync::Arc;

use cmdtree_argparse::{self as argparse, ParsedArgs};
use cmdtree_spec::{ArgType, CommandSpec, ConfigError, PositionalSpec};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use crate::command::{Command, CommandKind};
use crate::context::{Environment, ExecutionContext};
use crate::util::is_valid_command_name;

/// Name of the implicit trailing variadic that carries unconsumed tokens on
/// to the matched child.
const GROUP_REST_ARG: &str = "__cmdtree_rest";

/// Middleware verdict: continue down the chain or stop before the matched
/// child runs. Halting is intentional and carries no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

pub type Middleware = Box<dyn Fn(&ParsedArgs, &ExecutionContext) -> Flow + Send + Sync>;

/// Terminal state of one dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A leaf command ran to completion.
    Completed,
    /// The group help listing was rendered.
    HelpShown,
    /// A single command's help was rendered.
    SubHelp,
    /// No tokens were given.
    Empty,
    /// A middleware declined to continue.
    Halted,
    /// The command name did not resolve (or is hidden in this environment).
    NotFound,
    /// Group-level or leaf-level argument parsing failed.
    ParseFailed,
    /// The leaf command ran and returned an error.
    CommandFailed,
}

impl Outcome {
    /// Whether the host should treat this invocation as successful.
    pub fn success(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::HelpShown | Self::SubHelp | Self::Empty | Self::Halted
        )
    }
}

/// A registry of child commands plus the group's own argument schema and
/// middleware chain.
///
/// The registry maps lowercased names *and* aliases to shared handles, so
/// several keys can point at one command without duplicating it. Entries are
/// only added during application setup; dispatch takes `&self` and never
/// mutates.
pub struct Group {
    spec: CommandSpec,
    /// `spec` plus the implicit rest capture; prebuilt once.
    scan_spec: CommandSpec,
    registry: IndexMap<String, Arc<Command>>,
    middleware: Vec<Middleware>,
}

impl Group {
    /// A group with no flags or positionals of its own.
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::empty(),
            scan_spec: CommandSpec {
                positionals: vec![rest_positional()],
                flags: Vec::new(),
            },
            registry: IndexMap::new(),
            middleware: Vec::new(),
        }
    }

    /// A group with its own flags/positionals, parsed before child
    /// resolution.
    ///
    /// The spec must not declare a variadic positional: the trailing capture
    /// position belongs to the implicit rest argument that feeds the child.
    pub fn with_spec(spec: CommandSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        if spec.positionals.iter().any(|p| p.variadic) {
            return Err(ConfigError::invalid_spec(
                "Group specs cannot declare a variadic positional",
            ));
        }
        let mut scan_spec = spec.clone();
        scan_spec.positionals.push(rest_positional());
        Ok(Self {
            spec,
            scan_spec,
            registry: IndexMap::new(),
            middleware: Vec::new(),
        })
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Move a command into this registry, keyed by its lowercased name and
    /// every alias. Re-registering a name overwrites the previous mapping.
    pub fn register(&mut self, command: Command) -> Result<&mut Self, ConfigError> {
        for alias in command.aliases() {
            if !is_valid_command_name(&alias.name) {
                return Err(ConfigError::invalid_name(format!(
                    "Invalid alias '{}' for command '{}'",
                    alias.name,
                    command.name()
                )));
            }
        }

        let shared = Arc::new(command);
        self.registry
            .insert(shared.name().to_lowercase(), Arc::clone(&shared));
        for alias in shared.aliases() {
            self.registry
                .insert(alias.name.to_lowercase(), Arc::clone(&shared));
        }
        Ok(self)
    }

    /// Append a middleware; the chain runs in registration order.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&ParsedArgs, &ExecutionContext) -> Flow + Send + Sync + 'static,
    {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Resolve one command-name token and forward the remaining tokens.
    ///
    /// Recursion depth is bounded by the command-path length: every level
    /// shifts exactly one token before descending.
    pub fn dispatch<'a>(
        &'a self,
        tokens: &'a [String],
        ctx: ExecutionContext,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(first) = tokens.first() else {
                return self.run_empty(&ctx);
            };
            // Command names match case-insensitively; argument values are
            // forwarded verbatim.
            let command_name = first.to_lowercase();

            if matches!(command_name.as_str(), "help" | "--help" | "-h") {
                self.render_help(&ctx);
                return Outcome::HelpShown;
            }

            let entry = match self.registry.get(&command_name) {
                Some(entry) if entry.allowed_env().allows(ctx.environment) => entry,
                _ => return self.run_not_found(&command_name, &ctx),
            };
            tracing::debug!("dispatching '{command_name}'");

            let parsed = match argparse::parse_lenient(&self.scan_spec, &tokens[1..]) {
                Ok(parsed) => parsed,
                Err(err) => {
                    ctx.logger.error(err.message());
                    return Outcome::ParseFailed;
                }
            };
            let rest: Vec<String> = parsed
                .positional_list(GROUP_REST_ARG)
                .map(<[String]>::to_vec)
                .unwrap_or_default();

            for middleware in &self.middleware {
                if middleware(&parsed, &ctx) == Flow::Halt {
                    tracing::debug!("middleware halted dispatch of '{command_name}'");
                    return Outcome::Halted;
                }
            }

            match entry.kind() {
                CommandKind::Leaf { spec, run } => {
                    if rest.first().is_some_and(|t| t == "--help" || t == "-h") {
                        self.render_sub_help(entry.as_ref(), &ctx);
                        return Outcome::SubHelp;
                    }
                    let child_ctx = ctx.child(&command_name);
                    let child_args = match argparse::parse(spec, &rest) {
                        Ok(args) => args,
                        Err(err) => {
                            child_ctx.logger.error(err.message());
                            return Outcome::ParseFailed;
                        }
                    };
                    match run.run(child_args, &child_ctx).await {
                        Ok(()) => Outcome::Completed,
                        Err(err) => {
                            child_ctx.logger.error(&format!(
                                "Command '{}{command_name}' failed: {err:#}",
                                ctx.path_string()
                            ));
                            Outcome::CommandFailed
                        }
                    }
                }
                CommandKind::Group(group) => {
                    let child_ctx = ctx.child(&command_name);
                    group.dispatch(&rest, child_ctx).await
                }
            }
        })
    }

    fn run_empty(&self, ctx: &ExecutionContext) -> Outcome {
        if ctx.environment == Environment::Shell {
            self.render_help(ctx);
        }
        Outcome::Empty
    }

    fn run_not_found(&self, command_name: &str, ctx: &ExecutionContext) -> Outcome {
        let path = ctx.path_string();
        ctx.logger.info(&format!(
            "Command '{path}{command_name}' not found. Type \"{path}help\" for available commands."
        ));
        Outcome::NotFound
    }

    fn render_help(&self, ctx: &ExecutionContext) {
        let path = ctx.path_string();
        let mut message =
            format!("Available commands:\n - {path}help: Show available commands");

        for (key, cmd) in &self.registry {
            if !cmd.allowed_env().allows(ctx.environment) {
                continue;
            }
            if *key != cmd.name().to_lowercase() {
                let shown = cmd
                    .aliases()
                    .iter()
                    .any(|a| a.show_in_help && a.name.to_lowercase() == *key);
                if shown {
                    message.push_str(&format!("\n - {path}{key}: Alias for {}", cmd.name()));
                }
                continue;
            }
            message.push_str(&format!("\n - {path}{key}: {}", cmd.description()));
        }

        ctx.logger.info(&message);
    }

    fn render_sub_help(&self, cmd: &Command, ctx: &ExecutionContext) {
        let path = ctx.path_string();
        let name = cmd.name();
        let usage = cmd.usage_line();

        let mut message = format!(
            "Command '{path}{name}':\nDescription: {}",
            cmd.description()
        );
        if usage.is_empty() {
            message.push_str(&format!("\nUsage: '{path}{name}'"));
        } else {
            message.push_str(&format!("\nUsage: '{path}{name} {usage}'"));
        }
        let aliases: Vec<&str> = cmd.aliases().iter().map(|a| a.name.as_str()).collect();
        if !aliases.is_empty() {
            message.push_str(&format!("\nAliases: {}", aliases.join(", ")));
        }

        ctx.logger.info(&message);
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

fn rest_positional() -> PositionalSpec {
    PositionalSpec::new(GROUP_REST_ARG, ArgType::String).variadic()
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("commands", &self.registry.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Alias, CommandResult, Runnable};
    use crate::context::{BufferLogger, EnvSpec};
    use cmdtree_spec::FlagSpec;
    use std::sync::Mutex;

    struct Recorder {
        calls: Arc<Mutex<Vec<ParsedArgs>>>,
    }

    impl Recorder {
        fn new() -> (Self, Arc<Mutex<Vec<ParsedArgs>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl Runnable for Recorder {
        fn run<'a>(
            &'a self,
            args: ParsedArgs,
            _ctx: &'a ExecutionContext,
        ) -> BoxFuture<'a, CommandResult> {
            let calls = Arc::clone(&self.calls);
            Box::pin(async move {
                calls.lock().unwrap().push(args);
                Ok(())
            })
        }
    }

    struct Failing;

    impl Runnable for Failing {
        fn run<'a>(
            &'a self,
            _args: ParsedArgs,
            _ctx: &'a ExecutionContext,
        ) -> BoxFuture<'a, CommandResult> {
            Box::pin(async { anyhow::bail!("disk on fire") })
        }
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn shell_ctx() -> (ExecutionContext, Arc<BufferLogger>) {
        let logger = Arc::new(BufferLogger::new());
        (
            ExecutionContext::new(Environment::Shell, logger.clone()),
            logger,
        )
    }

    fn deploy_spec() -> CommandSpec {
        CommandSpec::define(
            vec![PositionalSpec::new("target", ArgType::String).required()],
            vec![FlagSpec::new("dry-run", ArgType::Boolean)],
        )
        .expect("valid spec")
    }

    #[tokio::test]
    async fn runs_matched_leaf_with_parsed_args() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group
            .dispatch(&tokens(&["deploy", "prod", "--dry-run"]), ctx)
            .await;

        assert_eq!(outcome, Outcome::Completed);
        assert!(logger.lines().is_empty());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].positional_str("target"), Some("prod"));
        assert!(calls[0].flag_bool("dry-run"));
    }

    #[tokio::test]
    async fn resolves_aliases_case_insensitively() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(
                Command::leaf("status", CommandSpec::empty(), recorder)
                    .unwrap()
                    .alias(Alias::shown("st")),
            )
            .unwrap();

        let (ctx, _) = shell_ctx();
        assert_eq!(group.dispatch(&tokens(&["ST"]), ctx).await, Outcome::Completed);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn environment_filtering_yields_not_found() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(
                Command::leaf("reload", CommandSpec::empty(), recorder)
                    .unwrap()
                    .environment(EnvSpec::Runtime),
            )
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["reload"]), ctx).await;

        assert_eq!(outcome, Outcome::NotFound);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            logger.lines(),
            vec!["Command 'reload' not found. Type \"help\" for available commands.".to_string()]
        );
    }

    #[tokio::test]
    async fn middleware_halt_prevents_run_without_error() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();
        group.use_middleware(|_, _| Flow::Halt);

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["deploy", "prod"]), ctx).await;

        assert_eq!(outcome, Outcome::Halted);
        assert!(outcome.success());
        assert!(calls.lock().unwrap().is_empty());
        assert!(logger.lines().is_empty());
    }

    #[tokio::test]
    async fn halting_middleware_stops_the_chain() {
        let (recorder, calls) = Recorder::new();
        let later = Arc::new(Mutex::new(0u32));
        let later_count = Arc::clone(&later);

        let mut group = Group::new();
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();
        group.use_middleware(|_, _| Flow::Halt);
        group.use_middleware(move |_, _| {
            *later_count.lock().unwrap() += 1;
            Flow::Continue
        });

        let (ctx, _) = shell_ctx();
        group.dispatch(&tokens(&["deploy", "prod"]), ctx).await;

        assert_eq!(*later.lock().unwrap(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn middleware_sees_group_level_flags() {
        let (recorder, calls) = Recorder::new();
        let seen = Arc::new(Mutex::new(None::<bool>));
        let seen_in_mw = Arc::clone(&seen);

        let group_spec =
            CommandSpec::define(vec![], vec![FlagSpec::new("trace", ArgType::Boolean)])
                .expect("valid spec");
        let mut group = Group::with_spec(group_spec).expect("valid group");
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();
        group.use_middleware(move |args, _| {
            *seen_in_mw.lock().unwrap() = Some(args.flag_bool("trace"));
            Flow::Continue
        });

        let (ctx, _) = shell_ctx();
        let outcome = group
            .dispatch(&tokens(&["deploy", "--trace", "prod"]), ctx)
            .await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(*seen.lock().unwrap(), Some(true));
        // The group-level flag is consumed; the child still gets its own
        // tokens.
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].positional_str("target"), Some("prod"));
    }

    #[tokio::test]
    async fn leaf_parse_failure_reports_and_stops() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["deploy"]), ctx).await;

        assert_eq!(outcome, Outcome::ParseFailed);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            logger.lines(),
            vec!["Missing required argument: 'target'".to_string()]
        );
    }

    #[tokio::test]
    async fn group_level_parse_failure_reports_and_stops() {
        let (recorder, calls) = Recorder::new();
        let group_spec =
            CommandSpec::define(vec![], vec![FlagSpec::new("limit", ArgType::Number)])
                .expect("valid spec");
        let mut group = Group::with_spec(group_spec).expect("valid group");
        group
            .register(Command::leaf("deploy", deploy_spec(), recorder).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group
            .dispatch(&tokens(&["deploy", "--limit=abc", "prod"]), ctx)
            .await;

        assert_eq!(outcome, Outcome::ParseFailed);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            logger.lines(),
            vec!["Flag '--limit': Expected number, got \"abc\"".to_string()]
        );
    }

    #[tokio::test]
    async fn failing_command_logs_and_reports_failure() {
        let mut group = Group::new();
        group
            .register(Command::leaf("burn", CommandSpec::empty(), Failing).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["burn"]), ctx).await;

        assert_eq!(outcome, Outcome::CommandFailed);
        assert!(!outcome.success());
        assert_eq!(
            logger.lines(),
            vec!["Command 'burn' failed: disk on fire".to_string()]
        );
    }

    #[tokio::test]
    async fn help_lists_commands_and_shown_aliases_filtered_by_environment() {
        let (status, _) = Recorder::new();
        let (reload, _) = Recorder::new();
        let mut group = Group::new();
        group
            .register(
                Command::leaf("status", CommandSpec::empty(), status)
                    .unwrap()
                    .describe("Show service status")
                    .alias(Alias::shown("st"))
                    .alias(Alias::new("s")),
            )
            .unwrap();
        group
            .register(
                Command::leaf("reload", CommandSpec::empty(), reload)
                    .unwrap()
                    .describe("Reload configuration")
                    .environment(EnvSpec::Runtime),
            )
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["help"]), ctx).await;

        assert_eq!(outcome, Outcome::HelpShown);
        let lines = logger.lines();
        assert_eq!(lines.len(), 1);
        let help = &lines[0];
        assert!(help.starts_with("Available commands:\n - help: Show available commands"));
        assert!(help.contains(" - status: Show service status"));
        assert!(help.contains(" - st: Alias for status"));
        assert!(!help.contains(" - s:"));
        assert!(!help.contains("reload"));
    }

    #[tokio::test]
    async fn leaf_help_renders_description_usage_and_aliases() {
        let (recorder, calls) = Recorder::new();
        let mut group = Group::new();
        group
            .register(
                Command::leaf("deploy", deploy_spec(), recorder)
                    .unwrap()
                    .describe("Roll out a release")
                    .alias(Alias::new("ship")),
            )
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = group.dispatch(&tokens(&["deploy", "--help"]), ctx).await;

        assert_eq!(outcome, Outcome::SubHelp);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            logger.lines(),
            vec![
                "Command 'deploy':\nDescription: Roll out a release\n\
                 Usage: 'deploy <target> [--dry-run <value>]'\nAliases: ship"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn nested_groups_accumulate_the_parent_path() {
        let (get, calls) = Recorder::new();
        let mut config = Group::new();
        config
            .register(Command::leaf("get", CommandSpec::empty(), get).unwrap())
            .unwrap();

        let mut root = Group::new();
        root.register(Command::group("config", config).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = root.dispatch(&tokens(&["config", "get"]), ctx).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(calls.lock().unwrap().len(), 1);

        // A miss inside the nested group names the full offending path.
        let ctx = ExecutionContext::new(Environment::Shell, logger.clone());
        let outcome = root.dispatch(&tokens(&["config", "bogus"]), ctx).await;
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(
            logger.lines().last().map(String::as_str),
            Some(
                "Command 'config bogus' not found. Type \"config help\" for available commands."
            )
        );
    }

    #[tokio::test]
    async fn sibling_dispatches_do_not_observe_each_others_path() {
        let (get, _) = Recorder::new();
        let mut config = Group::new();
        config
            .register(Command::leaf("get", CommandSpec::empty(), get).unwrap())
            .unwrap();

        let mut root = Group::new();
        root.register(Command::group("config", config).unwrap())
            .unwrap();

        let logger = Arc::new(BufferLogger::new());
        let first = ExecutionContext::new(Environment::Shell, logger.clone());
        root.dispatch(&tokens(&["config", "get"]), first).await;

        let second = ExecutionContext::new(Environment::Shell, logger.clone());
        root.dispatch(&tokens(&["bogus"]), second).await;

        // No stale "config" segment leaks into the second invocation.
        assert_eq!(
            logger.lines().last().map(String::as_str),
            Some("Command 'bogus' not found. Type \"help\" for available commands.")
        );
    }

    #[tokio::test]
    async fn empty_input_shows_help_in_shell_and_stays_quiet_in_runtime() {
        let group = Group::new();

        let (ctx, logger) = shell_ctx();
        assert_eq!(group.dispatch(&tokens(&[]), ctx).await, Outcome::Empty);
        assert_eq!(logger.lines().len(), 1);

        let logger = Arc::new(BufferLogger::new());
        let ctx = ExecutionContext::new(Environment::Runtime, logger.clone());
        assert_eq!(group.dispatch(&tokens(&[]), ctx).await, Outcome::Empty);
        assert!(logger.lines().is_empty());
    }

    #[tokio::test]
    async fn help_on_group_child_recurses_into_its_listing() {
        let (get, _) = Recorder::new();
        let mut config = Group::new();
        config
            .register(
                Command::leaf("get", CommandSpec::empty(), get)
                    .unwrap()
                    .describe("Read a value"),
            )
            .unwrap();

        let mut root = Group::new();
        root.register(Command::group("config", config).unwrap())
            .unwrap();

        let (ctx, logger) = shell_ctx();
        let outcome = root.dispatch(&tokens(&["config", "--help"]), ctx).await;

        assert_eq!(outcome, Outcome::HelpShown);
        let lines = logger.lines();
        assert!(lines[0].contains(" - config get: Read a value"));
        assert!(lines[0].contains(" - config help: Show available commands"));
    }

    #[test]
    fn group_spec_rejects_variadic_positionals() {
        let spec = CommandSpec::define(
            vec![PositionalSpec::new("rest", ArgType::String).variadic()],
            vec![],
        )
        .expect("valid spec");
        let err = Group::with_spec(spec).unwrap_err();
        assert!(err.message().contains("cannot declare a variadic"));
    }

    #[test]
    fn register_rejects_invalid_alias() {
        let (recorder, _) = Recorder::new();
        let mut group = Group::new();
        let err = group
            .register(
                Command::leaf("status", CommandSpec::empty(), recorder)
                    .unwrap()
                    .alias(Alias::new("bad alias")),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidName(_)));
    }
}
