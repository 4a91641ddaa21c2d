//! credcache - local secret cache for shell sessions

use clap::{CommandFactory, Parser};

mod cache;
mod cli;
mod config;
mod credentials;
mod env;
mod error;
mod output;
mod source;

use cli::args::GlobalOptions;
use cli::{Cli, CommandContext, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let opts = GlobalOptions::from_cli(&cli);

    let context = || CommandContext::new(&opts);

    match cli.command {
        Commands::Refresh {
            force,
            silent,
            background,
        } => cli::cache::refresh(&context()?, force, silent, background).await,
        Commands::Load => cli::secret::load(&context()?).await,
        Commands::Status => cli::status::run(&context()?),
        Commands::Clear => cli::cache::clear(&context()?),
        Commands::List => cli::status::list(&context()?),
        Commands::Get { key } => cli::secret::get(&context()?, &key).await,
        Commands::Exec { command } => cli::secret::exec(&context()?, &command).await,
        Commands::Path => cli::cache::path(&context()?),
        Commands::Completion { shell } => cli::completions::generate(shell),
    }
}

/// Warnings by default; `--debug` turns on this crate's debug output.
/// `RUST_LOG` wins over both.
fn init_logging(debug: bool) {
    let default = if debug { "warn,credcache=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
    log::debug!("Debug logging enabled");
}
