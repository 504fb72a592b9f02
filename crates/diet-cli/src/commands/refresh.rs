//! Refresh command: one pass that publishes the usage view and fires alerts.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use diet_core::{
    AlertDispatcher, BoxError, Collaborators, FiredAlert, RefreshService, UsageView,
    format_minutes, streak_summary,
};
use diet_db::Store;
use serde::Serialize;

use crate::Config;
use crate::commands::util::{PassLock, open_store};

/// Delivers alerts as lines on stderr, keeping stdout for the view.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDispatcher;

impl AlertDispatcher for TerminalDispatcher {
    fn dispatch(&self, alert: &FiredAlert) -> Result<(), BoxError> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "[alert] {}: {}", alert.title, alert.body)?;
        Ok(())
    }
}

/// Wires a store and dispatcher into a refresh service.
pub fn build_service(
    store: Arc<Store>,
    dispatcher: Arc<dyn AlertDispatcher>,
    config: &Config,
) -> Result<RefreshService> {
    let refresh_config = config
        .refresh_config()
        .context("invalid excluded package in configuration")?;
    Ok(RefreshService::new(
        Collaborators {
            source: store.clone(),
            preferences: store.clone(),
            debounce: store.clone(),
            metadata: store,
            dispatcher,
        },
        refresh_config,
    ))
}

#[derive(Serialize)]
struct RefreshOutput<'a> {
    view: &'a UsageView,
    fired: &'a [FiredAlert],
}

pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let service = build_service(store, Arc::new(TerminalDispatcher), config)?;
    let _lock = PassLock::acquire(&config.lock_path())?;
    run_at(writer, &service, &Local::now(), json)
}

pub fn run_at<W: Write, Tz: TimeZone>(
    writer: &mut W,
    service: &RefreshService,
    now: &DateTime<Tz>,
    json: bool,
) -> Result<()> {
    let report = service.refresh_at(now).context("refresh pass failed")?;
    if report.undelivered > 0 {
        tracing::warn!(undelivered = report.undelivered, "some alerts were not delivered");
    }

    if json {
        let output = RefreshOutput {
            view: &report.view,
            fired: &report.fired,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    render_view(writer, &report.view)?;
    if !report.fired.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Alerts fired: {}", report.fired.len())?;
    }
    Ok(())
}

/// Human-readable rendering of the main screen.
pub fn render_view<W: Write>(writer: &mut W, view: &UsageView) -> Result<()> {
    writeln!(writer, "Screen time for {}", view.today)?;
    if view.apps.is_empty() {
        writeln!(writer, "No usage recorded today.")?;
        return Ok(());
    }

    writeln!(writer)?;
    for app in &view.apps {
        let usage = format_minutes(app.current_usage);
        let name = if app.label == app.package.as_str() {
            app.package.to_string()
        } else {
            format!("{} [{}]", app.label, app.package)
        };
        if !app.tracked {
            writeln!(writer, "  {name}: {usage} (not tracked)")?;
        } else if app.goal == 0 {
            writeln!(writer, "  {name}: {usage} (no goal)")?;
        } else {
            writeln!(
                writer,
                "  {name}: {usage} of {}, {}",
                format_minutes(app.goal),
                streak_summary(app.streak)
            )?;
        }
    }

    writeln!(writer)?;
    if view.total_goal == 0 {
        writeln!(writer, "Total: {}", format_minutes(view.total_usage))?;
    } else {
        writeln!(
            writer,
            "Total: {} of {}",
            format_minutes(view.total_usage),
            format_minutes(view.total_goal)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use diet_core::{CoarseDailyStat, EventKind, PackageName, RawEvent};
    use diet_db::Database;
    use insta::assert_snapshot;

    #[derive(Default)]
    struct Recording {
        alerts: Mutex<Vec<FiredAlert>>,
    }

    impl AlertDispatcher for Recording {
        fn dispatch(&self, alert: &FiredAlert) -> Result<(), BoxError> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).unwrap()
    }

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    fn seeded_store() -> Arc<Store> {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_events(&[
            RawEvent::new(pkg("com.launcher"), ts(15, 8, 0), EventKind::ForegroundEnter),
            RawEvent::new(pkg("com.launcher"), ts(15, 8, 10), EventKind::ForegroundExit),
            RawEvent::new(pkg("com.video"), ts(15, 8, 10), EventKind::ForegroundEnter),
            RawEvent::new(pkg("com.video"), ts(15, 9, 25), EventKind::ForegroundExit),
            RawEvent::new(pkg("com.chat"), ts(15, 10, 0), EventKind::ForegroundEnter),
            RawEvent::new(pkg("android"), ts(15, 10, 12), EventKind::ScreenOff),
        ])
        .unwrap();
        db.upsert_daily_totals(&[CoarseDailyStat {
            date: "2025-01-14".to_string(),
            package: pkg("com.video"),
            minutes: 50,
        }])
        .unwrap();
        db.track(&pkg("com.video")).unwrap();
        db.track(&pkg("com.chat")).unwrap();
        db.set_goal(&pkg("com.video"), 60).unwrap();
        db.set_label(&pkg("com.video"), "Video").unwrap();
        Arc::new(Store::new(db))
    }

    fn config() -> Config {
        Config {
            launcher_package: Some("com.launcher".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_refresh_renders_view_and_delivers_alerts() {
        let dispatcher = Arc::new(Recording::default());
        let service = build_service(seeded_store(), dispatcher.clone(), &config()).unwrap();

        let mut output = Vec::new();
        run_at(&mut output, &service, &ts(15, 12, 0), false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Screen time for 2025-01-15

          com.chat: 0h 12m (no goal)
          Video [com.video]: 1h 15m of 1h 00m, 1 day in a row over the goal

        Total: 1h 27m of 1h 00m

        Alerts fired: 6
        ");

        let titles: Vec<_> = dispatcher
            .alerts
            .lock()
            .unwrap()
            .iter()
            .map(|alert| alert.title.clone())
            .collect();
        assert_eq!(
            titles,
            [
                "Video at 50%",
                "Video at 70%",
                "Video is over its goal",
                "Total screen time at 50%",
                "Total screen time at 70%",
                "Total screen time over goal",
            ]
        );
    }

    #[test]
    fn test_refresh_json_contains_view_and_alerts() {
        let service =
            build_service(seeded_store(), Arc::new(Recording::default()), &config()).unwrap();
        let mut output = Vec::new();
        run_at(&mut output, &service, &ts(15, 12, 0), true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["view"]["total_usage"], 87);
        assert_eq!(value["fired"].as_array().unwrap().len(), 6);
        assert_eq!(value["fired"][0]["key"], "app:com.video:50");
    }

    #[test]
    fn test_empty_day_renders_placeholder() {
        let mut output = Vec::new();
        render_view(&mut output, &UsageView::default()).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Screen time for 1970-01-01
        No usage recorded today.
        ");
    }
}
