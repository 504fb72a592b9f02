//! Threshold alerts with debouncing.
//!
//! Every monitored scope (each tracked package plus the aggregate) is checked
//! against the 50%, 70% and 100% thresholds of its goal:
//!
//! - 50% and 70% are daily-latched: they fire at most once per calendar day.
//! - 100% repeats: it fires again whenever more than the configured repeat
//!   interval has passed since it last fired.
//!
//! Evaluation is pure. It takes the current [`DebounceMemory`] and returns the
//! alerts to fire together with the memory to commit.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, ValidationError, format_minutes};

/// Goal-percentage thresholds that can raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Threshold {
    Half,
    Warning,
    Exceeded,
}

impl Threshold {
    /// Thresholds in evaluation order.
    pub const ALL: [Self; 3] = [Self::Half, Self::Warning, Self::Exceeded];

    pub const fn percent(self) -> u32 {
        match self {
            Self::Half => 50,
            Self::Warning => 70,
            Self::Exceeded => 100,
        }
    }

    pub const fn from_percent(percent: u32) -> Result<Self, ValidationError> {
        match percent {
            50 => Ok(Self::Half),
            70 => Ok(Self::Warning),
            100 => Ok(Self::Exceeded),
            value => Err(ValidationError::UnsupportedThreshold { value }),
        }
    }

    /// Whether the threshold fires once per day rather than on an interval.
    pub const fn is_daily_latched(self) -> bool {
        !matches!(self, Self::Exceeded)
    }
}

/// What an alert is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertScope {
    Package(PackageName),
    Aggregate,
}

/// Stable identifier of a `(scope, threshold)` pair.
///
/// Renders as `app:<package>:<percent>` or `total:<percent>`; the rendered
/// form is what debounce memory persists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotificationKey {
    pub scope: AlertScope,
    pub threshold: Threshold,
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            AlertScope::Package(package) => {
                write!(f, "app:{package}:{}", self.threshold.percent())
            }
            AlertScope::Aggregate => write!(f, "total:{}", self.threshold.percent()),
        }
    }
}

/// User toggles for each alert and the repeat interval for 100% alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub individual_50: bool,
    pub individual_70: bool,
    pub individual_100: bool,
    pub total_50: bool,
    pub total_70: bool,
    pub total_100: bool,
    pub repeat_interval_minutes: i64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            individual_50: true,
            individual_70: true,
            individual_100: true,
            total_50: true,
            total_70: true,
            total_100: true,
            repeat_interval_minutes: 5,
        }
    }
}

impl NotificationSettings {
    /// Rejects settings that cannot be evaluated.
    pub const fn validate(&self) -> Result<(), ValidationError> {
        if self.repeat_interval_minutes <= 0 {
            return Err(ValidationError::NonPositiveRepeatInterval {
                value: self.repeat_interval_minutes,
            });
        }
        Ok(())
    }

    pub const fn is_enabled(&self, scope: &AlertScope, threshold: Threshold) -> bool {
        match (scope, threshold) {
            (AlertScope::Package(_), Threshold::Half) => self.individual_50,
            (AlertScope::Package(_), Threshold::Warning) => self.individual_70,
            (AlertScope::Package(_), Threshold::Exceeded) => self.individual_100,
            (AlertScope::Aggregate, Threshold::Half) => self.total_50,
            (AlertScope::Aggregate, Threshold::Warning) => self.total_70,
            (AlertScope::Aggregate, Threshold::Exceeded) => self.total_100,
        }
    }

    /// Saturates at `Duration::MAX` for intervals chrono cannot represent.
    fn repeat_interval(&self) -> Duration {
        Duration::try_minutes(self.repeat_interval_minutes.max(1)).unwrap_or(Duration::MAX)
    }
}

/// Durable alert history used to suppress duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceMemory {
    /// Calendar day the latch set belongs to.
    pub latch_day: Option<NaiveDate>,
    /// Keys of daily-latched alerts already fired on `latch_day`.
    pub daily_latches: BTreeSet<String>,
    /// Last firing instant of each repeating alert.
    pub repeat_timestamps: BTreeMap<String, DateTime<Utc>>,
}

impl DebounceMemory {
    /// Clears the latch set once `today` is past `latch_day`. A clock that
    /// steps back keeps the existing latches.
    fn roll_over(&mut self, today: NaiveDate) {
        if self.latch_day.is_none_or(|day| today > day) {
            if !self.daily_latches.is_empty() {
                tracing::debug!(%today, cleared = self.daily_latches.len(), "resetting daily alert latches");
            }
            self.daily_latches.clear();
            self.latch_day = Some(today);
        }
    }
}

/// Usage and goal of one monitored package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeUsage {
    pub package: PackageName,
    pub label: String,
    pub usage: u32,
    pub goal: u32,
}

/// Everything the notifier needs from the current usage view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub packages: Vec<ScopeUsage>,
    pub aggregate_usage: u32,
    pub aggregate_goal: u32,
}

/// An alert the delivery collaborator should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredAlert {
    pub key: String,
    pub title: String,
    pub body: String,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub fired: Vec<FiredAlert>,
    /// Memory to commit, including latches and timestamps for `fired`.
    pub memory: DebounceMemory,
}

/// Decides which alerts fire at `now`.
///
/// The calendar day is taken from `now` in its own time zone, so callers pass
/// local time to get midnight latch resets. Scopes with a zero goal are
/// skipped. Never fails; an empty `fired` list is a normal outcome.
pub fn evaluate_thresholds<Tz: TimeZone>(
    snapshot: &UsageSnapshot,
    settings: &NotificationSettings,
    memory: &DebounceMemory,
    now: &DateTime<Tz>,
) -> Evaluation {
    let mut memory = memory.clone();
    memory.roll_over(now.date_naive());
    let now_utc = now.with_timezone(&Utc);

    let mut scopes: Vec<(AlertScope, &str, u32, u32)> = snapshot
        .packages
        .iter()
        .map(|p| {
            (
                AlertScope::Package(p.package.clone()),
                p.label.as_str(),
                p.usage,
                p.goal,
            )
        })
        .collect();
    scopes.push((
        AlertScope::Aggregate,
        "Total screen time",
        snapshot.aggregate_usage,
        snapshot.aggregate_goal,
    ));

    let mut fired = Vec::new();
    for (scope, label, usage, goal) in scopes {
        if goal == 0 {
            continue;
        }
        let percentage = 100.0 * f64::from(usage) / f64::from(goal);

        for threshold in Threshold::ALL {
            if percentage < f64::from(threshold.percent())
                || !settings.is_enabled(&scope, threshold)
            {
                continue;
            }

            let key = NotificationKey {
                scope: scope.clone(),
                threshold,
            }
            .to_string();

            let should_fire = if threshold.is_daily_latched() {
                memory.daily_latches.insert(key.clone())
            } else {
                let due = memory
                    .repeat_timestamps
                    .get(&key)
                    .is_none_or(|last| now_utc - *last > settings.repeat_interval());
                if due {
                    memory.repeat_timestamps.insert(key.clone(), now_utc);
                }
                due
            };

            if should_fire {
                let (title, body) = alert_text(&scope, label, threshold, usage, goal);
                tracing::debug!(%key, percentage, "alert threshold crossed");
                fired.push(FiredAlert { key, title, body });
            }
        }
    }

    Evaluation { fired, memory }
}

fn alert_text(
    scope: &AlertScope,
    label: &str,
    threshold: Threshold,
    usage: u32,
    goal: u32,
) -> (String, String) {
    let percent = threshold.percent();
    let title = match (scope, threshold) {
        (AlertScope::Package(_), Threshold::Exceeded) => format!("{label} is over its goal"),
        (AlertScope::Aggregate, Threshold::Exceeded) => "Total screen time over goal".to_string(),
        _ => format!("{label} at {percent}%"),
    };
    let body = if threshold == Threshold::Exceeded {
        format!(
            "Goal {} / used {}",
            format_minutes(goal),
            format_minutes(usage)
        )
    } else {
        format!(
            "You have used {percent}% of your {} goal.",
            format_minutes(goal)
        )
    };
    (title, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn pkg(name: &str) -> PackageName {
        PackageName::new(name).unwrap()
    }

    fn single(usage: u32, goal: u32) -> UsageSnapshot {
        UsageSnapshot {
            packages: vec![ScopeUsage {
                package: pkg("com.video"),
                label: "Video".to_string(),
                usage,
                goal,
            }],
            aggregate_usage: 0,
            aggregate_goal: 0,
        }
    }

    fn only_individual_70() -> NotificationSettings {
        NotificationSettings {
            individual_50: false,
            individual_70: true,
            individual_100: false,
            total_50: false,
            total_70: false,
            total_100: false,
            repeat_interval_minutes: 5,
        }
    }

    fn only_individual_100() -> NotificationSettings {
        NotificationSettings {
            individual_70: false,
            individual_100: true,
            ..only_individual_70()
        }
    }

    fn keys(evaluation: &Evaluation) -> Vec<&str> {
        evaluation.fired.iter().map(|a| a.key.as_str()).collect()
    }

    #[test]
    fn test_daily_latch_fires_once_per_day() {
        let snapshot = single(72, 100);
        let settings = only_individual_70();

        let first = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));
        assert_eq!(keys(&first), ["app:com.video:70"]);

        let second = evaluate_thresholds(&snapshot, &settings, &first.memory, &at(15, 22, 0));
        assert!(second.fired.is_empty());

        let next_day = evaluate_thresholds(&snapshot, &settings, &second.memory, &at(16, 0, 1));
        assert_eq!(keys(&next_day), ["app:com.video:70"]);
    }

    #[test]
    fn test_latch_reset_happens_on_day_change_only() {
        let snapshot = single(72, 100);
        let settings = only_individual_70();
        let first = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));
        assert_eq!(first.memory.latch_day, Some(at(15, 0, 0).date_naive()));

        let quiet = evaluate_thresholds(&single(10, 100), &settings, &first.memory, &at(15, 10, 0));
        assert!(quiet.memory.daily_latches.contains("app:com.video:70"));
    }

    #[test]
    fn test_repeat_interval_gates_exceeded_alert() {
        let snapshot = single(120, 100);
        let settings = only_individual_100();

        let t0 = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));
        assert_eq!(keys(&t0), ["app:com.video:100"]);

        let t3 = evaluate_thresholds(&snapshot, &settings, &t0.memory, &at(15, 9, 3));
        assert!(t3.fired.is_empty());

        let t6 = evaluate_thresholds(&snapshot, &settings, &t3.memory, &at(15, 9, 6));
        assert_eq!(keys(&t6), ["app:com.video:100"]);
        assert_eq!(
            t6.memory.repeat_timestamps.get("app:com.video:100"),
            Some(&at(15, 9, 6))
        );
    }

    #[test]
    fn test_huge_repeat_interval_suppresses_repeats() {
        let snapshot = single(120, 100);
        let settings = NotificationSettings {
            repeat_interval_minutes: i64::MAX,
            ..only_individual_100()
        };
        assert!(settings.validate().is_ok());

        let t0 = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));
        assert_eq!(keys(&t0), ["app:com.video:100"]);

        let t3 = evaluate_thresholds(&snapshot, &settings, &t0.memory, &at(15, 9, 3));
        assert!(t3.fired.is_empty());

        let later = evaluate_thresholds(&snapshot, &settings, &t3.memory, &at(28, 9, 0));
        assert!(later.fired.is_empty());
    }

    #[test]
    fn test_clock_stepping_back_keeps_latches() {
        let snapshot = single(72, 100);
        let settings = only_individual_70();
        let first = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(16, 0, 5));
        assert_eq!(keys(&first), ["app:com.video:70"]);

        let earlier = evaluate_thresholds(&snapshot, &settings, &first.memory, &at(15, 23, 58));
        assert!(earlier.fired.is_empty());
        assert_eq!(earlier.memory.latch_day, Some(at(16, 0, 0).date_naive()));
        assert!(earlier.memory.daily_latches.contains("app:com.video:70"));
    }

    #[test]
    fn test_repeat_requires_strictly_more_than_interval() {
        let snapshot = single(120, 100);
        let settings = only_individual_100();
        let t0 = evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));
        let t5 = evaluate_thresholds(&snapshot, &settings, &t0.memory, &at(15, 9, 5));
        assert!(t5.fired.is_empty());
    }

    #[test]
    fn test_zero_goal_never_fires() {
        let evaluation = evaluate_thresholds(
            &single(500, 0),
            &NotificationSettings::default(),
            &DebounceMemory::default(),
            &at(15, 9, 0),
        );
        assert!(evaluation.fired.is_empty());
    }

    #[test]
    fn test_disabled_toggles_never_fire() {
        let settings = NotificationSettings {
            individual_50: false,
            individual_70: false,
            individual_100: false,
            total_50: false,
            total_70: false,
            total_100: false,
            repeat_interval_minutes: 5,
        };
        let evaluation =
            evaluate_thresholds(&single(500, 100), &settings, &DebounceMemory::default(), &at(15, 9, 0));
        assert!(evaluation.fired.is_empty());
        assert!(evaluation.memory.daily_latches.is_empty());
    }

    #[test]
    fn test_crossing_all_thresholds_fires_each_once() {
        let mut snapshot = single(130, 100);
        snapshot.aggregate_usage = 60;
        snapshot.aggregate_goal = 100;

        let evaluation = evaluate_thresholds(
            &snapshot,
            &NotificationSettings::default(),
            &DebounceMemory::default(),
            &at(15, 9, 0),
        );
        assert_eq!(
            keys(&evaluation),
            [
                "app:com.video:50",
                "app:com.video:70",
                "app:com.video:100",
                "total:50"
            ]
        );
    }

    #[test]
    fn test_below_lowest_threshold_is_quiet() {
        let evaluation = evaluate_thresholds(
            &single(49, 100),
            &NotificationSettings::default(),
            &DebounceMemory::default(),
            &at(15, 9, 0),
        );
        assert!(evaluation.fired.is_empty());
    }

    #[test]
    fn test_alert_text_for_package_and_total() {
        let mut snapshot = single(65, 60);
        snapshot.aggregate_usage = 45;
        snapshot.aggregate_goal = 60;
        let settings = NotificationSettings {
            individual_50: false,
            individual_70: false,
            total_50: false,
            ..NotificationSettings::default()
        };
        let evaluation =
            evaluate_thresholds(&snapshot, &settings, &DebounceMemory::default(), &at(15, 9, 0));

        let rendered: Vec<String> = evaluation
            .fired
            .iter()
            .map(|a| format!("{} | {} | {}", a.key, a.title, a.body))
            .collect();
        insta::assert_snapshot!(rendered.join("\n"), @r"
        app:com.video:100 | Video is over its goal | Goal 1h 00m / used 1h 05m
        total:70 | Total screen time at 70% | You have used 70% of your 1h 00m goal.
        ");
    }

    #[test]
    fn test_settings_validation_rejects_zero_interval() {
        let settings = NotificationSettings {
            repeat_interval_minutes: 0,
            ..NotificationSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(NotificationSettings::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_percent_roundtrip() {
        for threshold in Threshold::ALL {
            assert_eq!(Threshold::from_percent(threshold.percent()), Ok(threshold));
        }
        assert!(Threshold::from_percent(90).is_err());
    }
}
