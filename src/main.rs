use clap::Parser;
use splitsync::args::{Args, Command};
use splitsync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().splitsync_home().path();

    // SPLITSYNC_IN_TEST_MODE (set and non-empty) routes every API call to the in-memory
    // ledger, so the whole program can run without a server.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.token_file(), init_args.server_url())
                .await?
                .print()
        }

        Command::Stage(stage_args) => {
            let config = Config::load(home).await?;
            commands::stage(config, stage_args.clone()).await?.print()
        }

        Command::Submit(submit_args) => {
            let config = Config::load(home).await?;
            commands::submit(config, mode, submit_args.clone())
                .await?
                .print()
        }

        Command::Retry => {
            let config = Config::load(home).await?;
            commands::retry(config, mode).await?.print()
        }

        Command::Pending => {
            let config = Config::load(home).await?;
            commands::pending(config).await?.print()
        }

        Command::Refresh(refresh_args) => {
            let config = Config::load(home).await?;
            commands::refresh(config, mode, refresh_args.clone())
                .await?
                .print()
        }

        Command::Report(report_args) => {
            let config = Config::load(home).await?;
            commands::report(config, mode, report_args.clone())
                .await?
                .print()
        }

        Command::Delete(delete_args) => {
            let config = Config::load(home).await?;
            commands::delete(config, mode, delete_args.clone())
                .await?
                .print()
        }

        Command::Search(search_args) => {
            let config = Config::load(home).await?;
            commands::search(config, mode, search_args.clone())
                .await?
                .print()
        }

        Command::Attachments(attachment_args) => {
            let config = Config::load(home).await?;
            commands::attachments(config, mode, attachment_args.clone())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber. RUST_LOG, when present, wins over `level`.
pub fn init_logger(level: LevelFilter) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        // Apply the requested level to this crate only; dependencies stay quiet.
        EnvFilter::new(format!(
            "{}={level},{}={level}",
            env!("CARGO_CRATE_NAME"),
            env!("CARGO_BIN_NAME")
        ))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
