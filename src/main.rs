use clap::Parser;
use tracing_subscriber::EnvFilter;

mod acquire;
mod cli;
mod core;
mod export;
mod parsing;
mod recon;
mod utils;
mod web;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("parcel_recon=debug,info")
    } else {
        EnvFilter::new("parcel_recon=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Compare(args) => {
            cli::compare::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::SessionId(args) => {
            cli::session::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Photos(args) => {
            cli::photos::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Serve(args) => {
            web::server::run(args)?;
        }
    }

    Ok(())
}
