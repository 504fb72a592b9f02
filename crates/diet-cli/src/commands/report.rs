//! Report command: calendar marks, monthly chart and streaks.
//!
//! The view is computed on the spot and never published, so reporting does not
//! fire alerts or touch debounce memory.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, TimeZone};
use diet_core::{
    CalendarMark, PackageName, RefreshService, UsageView, calendar_marks, format_minutes,
    month_success_days, monthly_series, streak_summary,
};
use serde::Serialize;

use crate::Config;
use crate::cli::ReportArgs;
use crate::commands::refresh::{TerminalDispatcher, build_service};
use crate::commands::util::{open_store, parse_month};

#[derive(Debug, Serialize)]
struct SeriesPoint {
    day: u32,
    minutes: u32,
}

#[derive(Debug, Serialize)]
struct MonthReport {
    /// Package, or `None` for all tracked apps.
    package: Option<PackageName>,
    year: i32,
    month: u32,
    timezone: String,
    goal: u32,
    success_days: usize,
    marks: Vec<CalendarMark>,
    series: Vec<SeriesPoint>,
    streak: Option<i32>,
}

impl MonthReport {
    fn build(
        view: &UsageView,
        package: Option<PackageName>,
        (year, month): (i32, u32),
        timezone: &str,
    ) -> Self {
        let marks: Vec<_> = calendar_marks(view, package.as_ref())
            .into_iter()
            .filter(|mark| mark.date.year() == year && mark.date.month() == month)
            .collect();
        let series = monthly_series(view, package.as_ref(), year, month)
            .into_iter()
            .map(|(day, minutes)| SeriesPoint { day, minutes })
            .collect();
        let (goal, streak) = match &package {
            Some(package) => (
                view.monitored_goal(package.as_str()),
                view.app(package.as_str())
                    .filter(|app| app.tracked && app.goal > 0)
                    .map(|app| app.streak),
            ),
            None => (view.total_goal, None),
        };
        Self {
            success_days: month_success_days(&marks, year, month),
            package,
            year,
            month,
            timezone: timezone.to_string(),
            goal,
            marks,
            series,
            streak,
        }
    }
}

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &ReportArgs) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let service = build_service(store, Arc::new(TerminalDispatcher), config)?;
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    run_at(writer, &service, args, &Local::now(), &timezone)
}

pub fn run_at<W: Write, Tz: TimeZone>(
    writer: &mut W,
    service: &RefreshService,
    args: &ReportArgs,
    now: &DateTime<Tz>,
    timezone: &str,
) -> Result<()> {
    let package = args
        .package
        .as_deref()
        .map(PackageName::new)
        .transpose()
        .context("invalid package")?;
    let month = parse_month(args.month.as_deref(), now)?;
    let view = service
        .compute_view_at(now)
        .context("failed to compute usage view")?;
    let report = MonthReport::build(&view, package, month, timezone);

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let subject = report
        .package
        .as_ref()
        .map_or_else(|| "all tracked apps".to_string(), ToString::to_string);
    writeln!(
        writer,
        "Report for {subject}, {:04}-{:02} ({})",
        report.year, report.month, report.timezone
    )?;
    if report.goal == 0 {
        writeln!(writer, "No goal to compare against.")?;
    } else {
        writeln!(writer, "Daily goal: {}", format_minutes(report.goal))?;
        writeln!(
            writer,
            "Days within goal: {} of {}",
            report.success_days,
            report.marks.len()
        )?;
    }

    if !report.marks.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Calendar:")?;
        for mark in &report.marks {
            writeln!(writer, "  {}  {}", mark.date, mark.status.as_str())?;
        }
    }

    if !report.series.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Daily usage:")?;
        for point in &report.series {
            writeln!(writer, "  {:>2}  {}", point.day, format_minutes(point.minutes))?;
        }
    }

    if let Some(streak) = report.streak {
        writeln!(writer)?;
        writeln!(writer, "Streak: {}", streak_summary(streak))?;
    }
    Ok(())
}
