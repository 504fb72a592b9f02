//! Alert settings commands.

use std::io::Write;

use anyhow::Result;
use diet_core::NotificationSettings;
use diet_db::Database;

use crate::cli::SettingsArgs;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn render<W: Write>(writer: &mut W, settings: &NotificationSettings) -> Result<()> {
    writeln!(writer, "Per-app alerts:")?;
    writeln!(writer, "  50%:  {}", on_off(settings.individual_50))?;
    writeln!(writer, "  70%:  {}", on_off(settings.individual_70))?;
    writeln!(writer, "  100%: {}", on_off(settings.individual_100))?;
    writeln!(writer, "Total alerts:")?;
    writeln!(writer, "  50%:  {}", on_off(settings.total_50))?;
    writeln!(writer, "  70%:  {}", on_off(settings.total_70))?;
    writeln!(writer, "  100%: {}", on_off(settings.total_100))?;
    writeln!(
        writer,
        "Repeat over-goal alerts every {} min",
        settings.repeat_interval_minutes
    )?;
    Ok(())
}

pub fn show<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    render(writer, &db.notification_settings()?)
}

/// Applies the given flags over the stored settings and prints the result.
pub fn set<W: Write>(writer: &mut W, db: &Database, args: &SettingsArgs) -> Result<()> {
    let current = db.notification_settings()?;
    let updated = NotificationSettings {
        individual_50: args.individual_50.unwrap_or(current.individual_50),
        individual_70: args.individual_70.unwrap_or(current.individual_70),
        individual_100: args.individual_100.unwrap_or(current.individual_100),
        total_50: args.total_50.unwrap_or(current.total_50),
        total_70: args.total_70.unwrap_or(current.total_70),
        total_100: args.total_100.unwrap_or(current.total_100),
        repeat_interval_minutes: args
            .repeat_interval
            .unwrap_or(current.repeat_interval_minutes),
    };
    db.set_notification_settings(&updated)?;
    tracing::debug!(?updated, "saved notification settings");
    render(writer, &updated)
}
