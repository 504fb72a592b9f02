//! Goal streaks.
//!
//! A streak is a signed day counter: positive for consecutive days at or under
//! the goal, negative for consecutive days over it. Usage exactly equal to the
//! goal counts as success.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::history::DailyUsage;
use crate::types::{Goals, PackageName, UsageMinutes};

/// Streak as of yesterday for one package.
///
/// `past_days` must exclude today; order does not matter, days are walked
/// newest first.
pub fn past_streak(past_days: &[&DailyUsage], package: &str, goal: u32) -> i32 {
    if goal == 0 {
        return 0;
    }

    let mut newest_first: Vec<&DailyUsage> = past_days.to_vec();
    newest_first.sort_by(|a, b| b.date.cmp(&a.date));

    let Some(first) = newest_first.first() else {
        return 0;
    };
    let was_success = first.minutes_for(package) <= goal;

    let count = newest_first
        .iter()
        .take_while(|day| (day.minutes_for(package) <= goal) == was_success)
        .count();
    let count = i32::try_from(count).unwrap_or(i32::MAX);

    if was_success { count } else { -count }
}

/// Folds today's outcome into the past streak.
///
/// One failure always resets a success streak to `-1`, and one success always
/// resets a failure streak to `1`.
pub const fn fold_today(past: i32, today_success: bool) -> i32 {
    match (past.signum(), today_success) {
        (1, true) => past.saturating_add(1),
        (-1, false) => past.saturating_sub(1),
        (_, true) => 1,
        (_, false) => -1,
    }
}

/// Final streak for every package in `goals`.
///
/// Entries of `history` dated `today` or later are ignored; `today_usage`
/// stands in for today. A goal of `0` yields `0`.
pub fn compute_streaks(
    history: &[DailyUsage],
    today: NaiveDate,
    today_usage: &UsageMinutes,
    goals: &Goals,
) -> BTreeMap<PackageName, i32> {
    let past_days: Vec<&DailyUsage> = history.iter().filter(|day| day.date < today).collect();

    goals
        .iter()
        .map(|(package, &goal)| {
            let streak = if goal == 0 {
                0
            } else {
                let past = past_streak(&past_days, package.as_str(), goal);
                let used = today_usage.get(package).copied().unwrap_or(0);
                fold_today(past, used <= goal)
            };
            (package.clone(), streak)
        })
        .collect()
}

/// Human-readable streak line for the calendar screen.
pub fn streak_summary(streak: i32) -> String {
    let days = streak.unsigned_abs();
    let unit = if days == 1 { "day" } else { "days" };
    if streak >= 0 {
        format!("{days} {unit} in a row meeting the goal")
    } else {
        format!("{days} {unit} in a row over the goal")
    }
}
