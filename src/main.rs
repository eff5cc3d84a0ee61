//! Hej command line client

use std::process::ExitCode;

use tracing_subscriber::prelude::*;

use hej::cli;
use hej::config;

const DEFAULT_RUST_LOG: &str = "hej=warn";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");

            if err.show_usage() {
                eprintln!();
                eprint!("{}", cli::USAGE);
            }

            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(args: &[String]) -> Result<(), cli::Error> {
    let args = cli::parse_args(args)?;

    let database = config::database_from_env(args.database)?;

    tracing::debug!("Using database {database}");

    let mut stdout = std::io::stdout().lock();

    cli::run(args.command, &database, &mut stdout).await
}

/// Log to stderr, stdout is for the output of the commands
fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
