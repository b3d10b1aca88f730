//! Keel CLI - Command-line interface for Keel migrations.

use clap::Parser;
use miette::Diagnostic;

use keel_cli::cli::{Cli, Command};
use keel_cli::commands;
use keel_cli::config::{Overrides, Settings};
use keel_cli::env::Environment;
use keel_cli::error::CliResult;
use keel_cli::{logging, output};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        if let Some(help) = e.help() {
            output::hint(&help.to_string());
        }
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let env = Environment::load(&cwd)?;
    logging::init(cli.global.verbose, &env);

    let force = match &cli.command {
        Command::New(args) => args.force,
        Command::Reset(args) | Command::Dropall(args) => args.force,
        Command::Init | Command::Up | Command::Status(_) => false,
    };
    let settings = Settings::load(&Overrides::from_args(&cli.global, force), &env, &cwd)?;

    match cli.command {
        Command::Init => commands::init::run(&settings).await,
        Command::Up => commands::up::run(&settings).await,
        Command::Status(args) => commands::status::run(&settings, &args).await,
        Command::New(args) => {
            commands::new::run(&settings, &env, &args, &mut std::io::stdin().lock()).await
        }
        Command::Reset(_) => commands::reset::run(&settings, &mut std::io::stdin().lock()).await,
        Command::Dropall(_) => {
            commands::dropall::run(&settings, &mut std::io::stdin().lock()).await
        }
    }
}
