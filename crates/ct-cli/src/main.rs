use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ct_cli::commands::{
    adjust, estimate, export, report, reset, status, stop_all, timer, watch,
};
use ct_cli::{BoardFile, Cli, Commands, Config, Tracker};

/// Load config, open the database and read the board, ensuring the
/// database directory exists.
fn open_tracker(config_path: Option<&Path>) -> Result<(Tracker<BoardFile>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = ct_db::Database::open(&config.database_path).context("failed to open database")?;
    db.set_busy_timeout(config.busy_timeout())
        .context("failed to configure database")?;
    let board = BoardFile::load(&config.board_path).context("failed to read board")?;
    Ok((Tracker::new(db, board), config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tracing may already be set up when run from tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut tracker, config) = open_tracker(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();
    let now = Utc::now();

    match command {
        Commands::Start(args) => timer::start(&mut stdout, args, &mut tracker, now)?,
        Commands::Stop(args) => timer::stop(&mut stdout, args, &mut tracker, now)?,
        Commands::Toggle(args) => timer::toggle(&mut stdout, args, &mut tracker, now)?,
        Commands::Adjust(args) => adjust::run(&mut stdout, args, &mut tracker, now)?,
        Commands::Reset(args) => reset::run(&mut stdout, args, &mut tracker)?,
        Commands::StopAll(args) => stop_all::run(&mut stdout, args, &mut tracker, now)?,
        Commands::Status(args) => status::run(&mut stdout, args, &mut tracker, now)?,
        Commands::Estimate { action } => estimate::run(&mut stdout, action, &mut tracker, now)?,
        Commands::Report(args) => report::run(&mut stdout, args, &mut tracker, now)?,
        Commands::Export(args) => {
            export::run(&mut stdout, args, &mut tracker, config.csv_delimiter, now)?;
        }
        Commands::Watch(args) => watch::run(
            &mut stdout,
            args,
            &mut tracker,
            config.poll_interval(),
            config.tick_interval(),
        )?,
    }

    Ok(())
}
