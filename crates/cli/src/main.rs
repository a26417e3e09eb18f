mod commands;

use std::sync::Arc;

use anyhow::Result;
use cmdtree_core::{App, ArgType, Environment, FlagSpec, Flow, Logger};
use tracing_subscriber::{EnvFilter, fmt};

/// Routes dispatcher output to the console: listings and notices to stdout,
/// warnings and errors to stderr, debug to tracing.
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn main() -> Result<()> {
    init_tracing();

    let app = build_app()?;
    let tokens: Vec<String> = std::env::args().skip(1).collect();

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(app.handle(&tokens, Environment::Shell));

    // Exit-on-error policy lives here, not in the dispatcher.
    if !outcome.success() {
        std::process::exit(1);
    }
    Ok(())
}

fn build_app() -> Result<App> {
    let mut app = App::with_global_flags(
        Arc::new(ConsoleLogger),
        vec![FlagSpec::new("trace", ArgType::Boolean).describe("Trace dispatch decisions")],
    )?;

    app.use_middleware(|args, ctx| {
        if args.flag_bool("trace") {
            ctx.logger.debug("dispatch trace enabled");
        }
        Flow::Continue
    });

    app.register(commands::version()?)?;
    app.register(commands::greet()?)?;
    app.register(commands::sum()?)?;
    app.register(commands::config()?)?;

    Ok(app)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
