//! Status command for showing what has been recorded.

use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;

use crate::Config;
use crate::commands::util::open_database;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let summary = db.summary()?;
    let tracked = db.tracked()?;

    writeln!(writer, "Screen-time diet status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Events: {}", summary.events)?;
    writeln!(writer, "Daily records: {}", summary.daily_totals)?;
    writeln!(writer, "Goals: {}", summary.goals)?;

    if tracked.is_empty() {
        writeln!(writer, "Tracked apps: none")?;
    } else {
        let names: Vec<_> = tracked.iter().map(|package| package.as_str()).collect();
        writeln!(writer, "Tracked apps: {}", names.join(", "))?;
    }

    match summary.last_event {
        Some(at) => writeln!(
            writer,
            "Last event: {}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?,
        None => writeln!(writer, "No events recorded.")?,
    }
    Ok(())
}
