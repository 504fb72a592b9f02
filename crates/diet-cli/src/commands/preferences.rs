//! Goal, tracked-set and label commands.

use std::io::Write;

use anyhow::{Context, Result};
use diet_core::{PackageName, format_minutes};
use diet_db::Database;

fn package(raw: &str) -> Result<PackageName> {
    PackageName::new(raw).with_context(|| format!("invalid package: {raw:?}"))
}

pub fn goal_set<W: Write>(writer: &mut W, db: &Database, raw: &str, minutes: u32) -> Result<()> {
    let package = package(raw)?;
    db.set_goal(&package, minutes)?;
    if minutes == 0 {
        writeln!(writer, "Removed goal for {package}")?;
    } else {
        writeln!(
            writer,
            "Goal for {package}: {}",
            format_minutes(minutes)
        )?;
    }
    Ok(())
}

pub fn goal_list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let goals = db.goals()?;
    if goals.is_empty() {
        writeln!(writer, "No goals set.")?;
        return Ok(());
    }
    let tracked = db.tracked()?;
    for (package, minutes) in &goals {
        let marker = if tracked.contains(package) {
            ""
        } else {
            " (not tracked)"
        };
        writeln!(writer, "{package}: {}{marker}", format_minutes(*minutes))?;
    }
    Ok(())
}

pub fn track_add<W: Write>(writer: &mut W, db: &Database, packages: &[String]) -> Result<()> {
    for raw in packages {
        let package = package(raw)?;
        if db.track(&package)? {
            writeln!(writer, "Tracking {package}")?;
        } else {
            writeln!(writer, "Already tracking {package}")?;
        }
    }
    Ok(())
}

pub fn track_remove<W: Write>(writer: &mut W, db: &Database, packages: &[String]) -> Result<()> {
    for raw in packages {
        let package = package(raw)?;
        if db.untrack(&package)? {
            writeln!(writer, "Stopped tracking {package}")?;
        } else {
            writeln!(writer, "{package} was not tracked")?;
        }
    }
    Ok(())
}

pub fn track_list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let tracked = db.tracked()?;
    if tracked.is_empty() {
        writeln!(writer, "No apps tracked.")?;
        return Ok(());
    }
    for package in &tracked {
        match db.label(package)? {
            Some(label) => writeln!(writer, "{package} ({label})")?,
            None => writeln!(writer, "{package}")?,
        }
    }
    Ok(())
}

pub fn label<W: Write>(writer: &mut W, db: &Database, raw: &str, label: &str) -> Result<()> {
    let package = package(raw)?;
    db.set_label(&package, label)?;
    writeln!(writer, "Labelled {package} as {}", label.trim())?;
    Ok(())
}
