use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use diet_cli::commands::{
    import, ingest, preferences, refresh, report, settings, status, util, watch,
};
use diet_cli::{Cli, Commands, Config, GoalAction, IngestRecord, SettingsAction, TrackAction};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Status => status::run(&mut stdout, &config)?,
        Commands::Ingest { record } => {
            let mut db = util::open_database(&config)?;
            match record {
                IngestRecord::Event { package, kind, at } => {
                    if ingest::event(&mut db, package, kind, at.as_deref())? {
                        tracing::debug!("event ingested");
                    } else {
                        tracing::debug!("duplicate event ignored");
                    }
                }
                IngestRecord::Daily {
                    date,
                    package,
                    minutes,
                } => ingest::daily(&mut db, date, package, *minutes)?,
            }
        }
        Commands::Import => {
            let mut db = util::open_database(&config)?;
            let summary = import::run(io::stdin().lock(), &mut db)?;
            writeln!(
                stdout,
                "Imported {} events and {} daily records",
                summary.events, summary.daily_totals
            )?;
        }
        Commands::Goal(action) => {
            let db = util::open_database(&config)?;
            match action {
                GoalAction::Set { package, minutes } => {
                    preferences::goal_set(&mut stdout, &db, package, *minutes)?;
                }
                GoalAction::List => preferences::goal_list(&mut stdout, &db)?,
            }
        }
        Commands::Track(action) => {
            let db = util::open_database(&config)?;
            match action {
                TrackAction::Add { packages } => preferences::track_add(&mut stdout, &db, packages)?,
                TrackAction::Remove { packages } => {
                    preferences::track_remove(&mut stdout, &db, packages)?;
                }
                TrackAction::List => preferences::track_list(&mut stdout, &db)?,
            }
        }
        Commands::Label { package, label } => {
            let db = util::open_database(&config)?;
            preferences::label(&mut stdout, &db, package, label)?;
        }
        Commands::Settings(action) => {
            let db = util::open_database(&config)?;
            match action {
                SettingsAction::Show => settings::show(&mut stdout, &db)?,
                SettingsAction::Set(args) => settings::set(&mut stdout, &db, args)?,
            }
        }
        Commands::Refresh { json } => refresh::run(&mut stdout, &config, *json)?,
        Commands::Report(args) => report::run(&mut stdout, &config, args)?,
        Commands::Watch { interval_secs } => {
            drop(stdout);
            watch::run(&config, *interval_secs)?;
        }
    }

    Ok(())
}
