//! Daily usage history.
//!
//! Coarse per-day totals seed the trailing window; today's entry is then
//! replaced wholesale by the precise reconstruction, since the coarse source
//! cannot reflect a partial day.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, UsageMinutes};

/// Calendar-day key format used for storage and display.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default number of trailing days kept in the history.
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// One coarse daily total as delivered by the OS stat query.
///
/// The date is kept raw: the source may hand back values that do not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarseDailyStat {
    pub date: String,
    pub package: PackageName,
    pub minutes: i64,
}

/// Usage of every package on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub usage: UsageMinutes,
}

impl DailyUsage {
    pub const fn new(date: NaiveDate, usage: UsageMinutes) -> Self {
        Self { date, usage }
    }

    /// Minutes used by `package`, `0` if it has no entry.
    pub fn minutes_for(&self, package: &str) -> u32 {
        self.usage.get(package).copied().unwrap_or(0)
    }

    /// Sum of minutes over the given packages.
    pub fn total_for<'a, I>(&self, packages: I) -> u32
    where
        I: IntoIterator<Item = &'a PackageName>,
    {
        packages
            .into_iter()
            .map(|package| self.minutes_for(package.as_str()))
            .fold(0, u32::saturating_add)
    }
}

/// Parses a `YYYY-MM-DD` day key.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// First day of a `history_days` window ending at `today`, clamped to the
/// earliest representable date.
pub fn history_start(today: NaiveDate, history_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(history_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Builds the ordered history for the trailing `history_days` ending at `today`.
///
/// Records with unparseable dates or dates outside the window are skipped.
/// A day appears only if the coarse source returned at least one record for
/// it, except `today`, which is always present and always equals
/// `today_precise`. The result is sorted ascending by date.
pub fn aggregate_history(
    coarse: &[CoarseDailyStat],
    today_precise: &UsageMinutes,
    today: NaiveDate,
    history_days: u32,
) -> Vec<DailyUsage> {
    let oldest = history_start(today, history_days);
    let mut days: BTreeMap<NaiveDate, UsageMinutes> = BTreeMap::new();

    for stat in coarse {
        let Some(date) = parse_day(&stat.date) else {
            tracing::debug!(date = %stat.date, package = %stat.package, "skipping coarse stat with malformed date");
            continue;
        };
        if date < oldest || date > today {
            continue;
        }

        let day = days.entry(date).or_default();
        let minutes = u32::try_from(stat.minutes.max(0)).unwrap_or(u32::MAX);
        if minutes > 0 {
            let slot = day.entry(stat.package.clone()).or_insert(0);
            *slot = slot.saturating_add(minutes);
        }
    }

    days.insert(today, today_precise.clone());

    days.into_iter()
        .map(|(date, usage)| DailyUsage::new(date, usage))
        .collect()
}
