//! Import command for loading usage records into the local `SQLite` store.
//!
//! Each stdin line is one JSON object tagged by `type`:
//!
//! ```text
//! {"type":"event","package":"com.video","kind":"foreground_enter","timestamp":"2025-01-15T09:00:00Z"}
//! {"type":"daily","date":"2025-01-14","package":"com.video","minutes":90}
//! ```
//!
//! Daily dates are stored as given; ones that do not parse are ignored when
//! history is aggregated.

use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diet_core::{CoarseDailyStat, EventKind, PackageName, RawEvent};
use diet_db::Database;
use serde::Deserialize;

/// Counts of stored records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub events: usize,
    pub daily_totals: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImportRecord {
    Event {
        package: PackageName,
        kind: EventKind,
        timestamp: DateTime<Utc>,
    },
    Daily {
        date: String,
        package: PackageName,
        minutes: i64,
    },
}

pub fn run<R: BufRead>(reader: R, db: &mut Database) -> Result<ImportSummary> {
    let (events, stats) = parse_records(reader)?;
    let summary = ImportSummary {
        events: db.insert_events(&events)?,
        daily_totals: db.upsert_daily_totals(&stats)?,
    };
    tracing::info!(
        events = summary.events,
        daily_totals = summary.daily_totals,
        "import complete"
    );
    Ok(summary)
}

fn parse_records<R: BufRead>(reader: R) -> Result<(Vec<RawEvent>, Vec<CoarseDailyStat>)> {
    let mut events = Vec::new();
    let mut stats = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        match record {
            ImportRecord::Event {
                package,
                kind,
                timestamp,
            } => events.push(RawEvent::new(package, timestamp, kind)),
            ImportRecord::Daily {
                date,
                package,
                minutes,
            } => stats.push(CoarseDailyStat {
                date,
                package,
                minutes,
            }),
        }
    }
    Ok((events, stats))
}
