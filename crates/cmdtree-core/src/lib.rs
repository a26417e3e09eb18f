//! Command-tree definition and dispatch.
//!
//! A CLI program is modeled as a tree of named commands: leaves carry an
//! argument schema and a run capability, groups own a registry of children
//! plus a middleware chain, and dispatch walks the tree one command-name
//! token at a time. Argument scanning and coercion live in
//! `cmdtree-argparse`; the schema model lives in `cmdtree-spec`. Both are
//! re-exported here so most users only depend on this crate.
//!
//! Dispatch is strictly sequential per call chain: a command's `run` future
//! is awaited to completion before the dispatcher returns, and registries
//! are treated as read-only once handling begins.

mod app;
mod command;
mod context;
mod group;
mod util;

pub use app::App;
pub use command::{Alias, Command, CommandKind, CommandResult, Runnable};
pub use context::{BufferLogger, EnvSpec, Environment, ExecutionContext, Logger, TracingLogger};
pub use group::{Flow, Group, Middleware, Outcome};
pub use util::{is_valid_command_name, parent_path_string};

pub use cmdtree_argparse::{
    ParseError, ParseResult, ParsedArgs, generate_usage, parse, parse_lenient,
};
pub use cmdtree_spec::{ArgType, ArgValue, CommandSpec, ConfigError, FlagSpec, PositionalSpec};

// Implementors of `Runnable` need the boxed future type.
pub use futures_util::future::BoxFuture;
