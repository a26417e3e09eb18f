//! Sample commands wired into the demo host.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use cmdtree_core::{
    Alias, ArgType, ArgValue, BoxFuture, Command, CommandResult, CommandSpec, ExecutionContext,
    FlagSpec, Group, ParsedArgs, PositionalSpec, Runnable,
};

struct VersionCmd;

impl Runnable for VersionCmd {
    fn run<'a>(
        &'a self,
        _args: ParsedArgs,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async {
            println!("cmdtree {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        })
    }
}

pub fn version() -> Result<Command> {
    Ok(Command::leaf("version", CommandSpec::empty(), VersionCmd)?
        .describe("Show the demo host version")
        .alias(Alias::new("-v")))
}

struct GreetCmd;

impl Runnable for GreetCmd {
    fn run<'a>(
        &'a self,
        args: ParsedArgs,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async move {
            let name = args.positional_str("name").context("name is required")?;
            let mut greeting = format!("Hello, {name}!");
            if args.flag_bool("shout") {
                greeting = greeting.to_uppercase();
            }
            let times = args.flag_number("times").unwrap_or(1.0).max(1.0) as usize;
            for _ in 0..times {
                println!("{greeting}");
            }
            Ok(())
        })
    }
}

pub fn greet() -> Result<Command> {
    let spec = CommandSpec::define(
        vec![
            PositionalSpec::new("name", ArgType::String)
                .required()
                .describe("Who to greet"),
        ],
        vec![
            FlagSpec::new("shout", ArgType::Boolean)
                .short("s")
                .describe("Print in uppercase"),
            FlagSpec::new("times", ArgType::Number)
                .short("t")
                .default_value(ArgValue::Number(1.0))
                .describe("Repeat count"),
        ],
    )?;
    Ok(Command::leaf("greet", spec, GreetCmd)?.describe("Greet someone by name"))
}

struct SumCmd;

impl Runnable for SumCmd {
    fn run<'a>(
        &'a self,
        args: ParsedArgs,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async move {
            let values = args.positional_list("values").unwrap_or_default();
            let mut total = 0.0f64;
            for raw in values {
                total += raw
                    .parse::<f64>()
                    .with_context(|| format!("not a number: {raw}"))?;
            }
            println!("{total}");
            Ok(())
        })
    }
}

pub fn sum() -> Result<Command> {
    let spec = CommandSpec::define(
        vec![
            PositionalSpec::new("values", ArgType::String)
                .required()
                .variadic()
                .describe("Numbers to add"),
        ],
        vec![],
    )?;
    Ok(Command::leaf("sum", spec, SumCmd)?.describe("Add up a list of numbers"))
}

type Store = Arc<Mutex<BTreeMap<String, String>>>;

struct ConfigGetCmd {
    store: Store,
}

impl Runnable for ConfigGetCmd {
    fn run<'a>(
        &'a self,
        args: ParsedArgs,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async move {
            let key = args.positional_str("key").context("key is required")?;
            let store = self
                .store
                .lock()
                .map_err(|_| anyhow!("config store poisoned"))?;
            match store.get(key) {
                Some(value) if args.flag_str("output") == Some("json") => {
                    println!("{}", serde_json::json!({ "key": key, "value": value }));
                }
                Some(value) => println!("{key} = {value}"),
                None => println!("{key} is not set"),
            }
            Ok(())
        })
    }
}

struct ConfigSetCmd {
    store: Store,
}

impl Runnable for ConfigSetCmd {
    fn run<'a>(
        &'a self,
        args: ParsedArgs,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async move {
            let key = args.positional_str("key").context("key is required")?;
            let value = args.positional_str("value").context("value is required")?;
            self.store
                .lock()
                .map_err(|_| anyhow!("config store poisoned"))?
                .insert(key.to_string(), value.to_string());
            println!("{key} = {value}");
            Ok(())
        })
    }
}

pub fn config() -> Result<Command> {
    let store: Store = Arc::default();

    let get_spec = CommandSpec::define(
        vec![
            PositionalSpec::new("key", ArgType::String)
                .required()
                .describe("Setting to read"),
        ],
        vec![
            FlagSpec::new("output", ArgType::Enum)
                .short("o")
                .allow(["plain", "json"])
                .default_value(ArgValue::Str("plain".into()))
                .describe("Output format"),
        ],
    )?;
    let set_spec = CommandSpec::define(
        vec![
            PositionalSpec::new("key", ArgType::String)
                .required()
                .describe("Setting to write"),
            PositionalSpec::new("value", ArgType::String)
                .required()
                .describe("New value"),
        ],
        vec![],
    )?;

    let mut group = Group::new();
    group.register(
        Command::leaf(
            "get",
            get_spec,
            ConfigGetCmd {
                store: Arc::clone(&store),
            },
        )?
        .describe("Read a setting"),
    )?;
    group.register(
        Command::leaf("set", set_spec, ConfigSetCmd { store })?.describe("Write a setting"),
    )?;

    Ok(Command::group("config", group)?
        .describe("Read and write demo settings")
        .alias(Alias::shown("cfg")))
}
