//! Calendar and chart figures derived from a [`UsageView`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::history::DailyUsage;
use crate::types::PackageName;
use crate::view::UsageView;

/// How a day went relative to its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Success,
    /// Still within goal but above 70% of it.
    Warning,
    Fail,
}

impl DayStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Fail => "fail",
        }
    }
}

/// Classifies one day; `None` when there is no goal.
pub fn classify_day(usage: u32, goal: u32) -> Option<DayStatus> {
    if goal == 0 {
        return None;
    }
    let status = if usage > goal {
        DayStatus::Fail
    } else if u64::from(usage) * 10 > u64::from(goal) * 7 {
        DayStatus::Warning
    } else {
        DayStatus::Success
    };
    Some(status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMark {
    pub date: NaiveDate,
    pub status: DayStatus,
}

/// Minutes and goal of `day` for the filter: one package, or all tracked
/// packages when `filter` is `None`.
fn usage_and_goal(view: &UsageView, day: &DailyUsage, filter: Option<&PackageName>) -> (u32, u32) {
    match filter {
        Some(package) => (
            day.minutes_for(package.as_str()),
            view.monitored_goal(package.as_str()),
        ),
        None => (day.total_for(&view.tracked), view.total_goal),
    }
}

/// One mark per history day that has a goal to compare against.
pub fn calendar_marks(view: &UsageView, filter: Option<&PackageName>) -> Vec<CalendarMark> {
    view.history
        .iter()
        .filter_map(|day| {
            let (usage, goal) = usage_and_goal(view, day, filter);
            classify_day(usage, goal).map(|status| CalendarMark {
                date: day.date,
                status,
            })
        })
        .collect()
}

/// Days of the month that stayed within goal (success or warning).
pub fn month_success_days(marks: &[CalendarMark], year: i32, month: u32) -> usize {
    marks
        .iter()
        .filter(|mark| mark.date.year() == year && mark.date.month() == month)
        .filter(|mark| matches!(mark.status, DayStatus::Success | DayStatus::Warning))
        .count()
}

/// `(day_of_month, minutes)` chart points for one month.
pub fn monthly_series(
    view: &UsageView,
    filter: Option<&PackageName>,
    year: i32,
    month: u32,
) -> Vec<(u32, u32)> {
    view.history
        .iter()
        .filter(|day| day.date.year() == year && day.date.month() == month)
        .map(|day| {
            let (usage, _) = usage_and_goal(view, day, filter);
            (day.date.day(), usage)
        })
        .collect()
}
