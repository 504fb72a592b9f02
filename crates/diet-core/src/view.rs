//! The published usage view.
//!
//! One immutable value per refresh: history, per-app rows and totals are
//! computed together so readers never see them out of step.
//!
//! Goals, streaks, totals and alerts only consider tracked packages. With an
//! empty tracked set nothing is monitored, though `apps` still lists every
//! package used today for display.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::history::DailyUsage;
use crate::notify::{ScopeUsage, UsageSnapshot};
use crate::streak::compute_streaks;
use crate::types::{Goals, PackageName, UsageMinutes};

/// One row of the main screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsage {
    pub package: PackageName,
    pub label: String,
    pub current_usage: u32,
    pub goal: u32,
    /// Positive: days at or under goal; negative: days over goal.
    pub streak: i32,
    pub tracked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageView {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    /// Ascending by date, today included.
    pub history: Vec<DailyUsage>,
    /// Sorted by lower-cased label, then package.
    pub apps: Vec<AppUsage>,
    pub tracked: BTreeSet<PackageName>,
    /// Today's usage summed over tracked packages.
    pub total_usage: u32,
    /// Goals summed over tracked packages.
    pub total_goal: u32,
}

/// Inputs of [`build_view`], already fetched from collaborators.
#[derive(Debug, Clone, Copy)]
pub struct ViewInputs<'a> {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub history: &'a [DailyUsage],
    pub today_usage: &'a UsageMinutes,
    pub goals: &'a Goals,
    pub tracked: &'a BTreeSet<PackageName>,
    pub labels: &'a BTreeMap<PackageName, String>,
}

impl UsageView {
    pub fn app(&self, package: &str) -> Option<&AppUsage> {
        self.apps.iter().find(|app| app.package.as_str() == package)
    }

    /// History without today's entry.
    pub fn past_days(&self) -> impl Iterator<Item = &DailyUsage> {
        self.history.iter().filter(|day| day.date < self.today)
    }

    /// Goal of a tracked package; `0` for untracked or goal-less packages.
    pub fn monitored_goal(&self, package: &str) -> u32 {
        self.app(package)
            .filter(|app| app.tracked)
            .map_or(0, |app| app.goal)
    }

    /// Input for the threshold notifier: tracked packages and their totals.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            packages: self
                .apps
                .iter()
                .filter(|app| app.tracked)
                .map(|app| ScopeUsage {
                    package: app.package.clone(),
                    label: app.label.clone(),
                    usage: app.current_usage,
                    goal: app.goal,
                })
                .collect(),
            aggregate_usage: self.total_usage,
            aggregate_goal: self.total_goal,
        }
    }
}

/// Combines history, today's usage, goals and streaks into a [`UsageView`].
pub fn build_view(inputs: &ViewInputs<'_>) -> UsageView {
    let monitored_goals: Goals = inputs
        .goals
        .iter()
        .filter(|(package, _)| inputs.tracked.contains(*package))
        .map(|(package, goal)| (package.clone(), *goal))
        .collect();
    let streaks = compute_streaks(
        inputs.history,
        inputs.today,
        inputs.today_usage,
        &monitored_goals,
    );

    let packages: BTreeSet<&PackageName> = inputs
        .tracked
        .iter()
        .chain(inputs.today_usage.keys())
        .chain(inputs.goals.keys())
        .collect();

    let mut apps: Vec<AppUsage> = packages
        .into_iter()
        .map(|package| AppUsage {
            package: package.clone(),
            label: inputs
                .labels
                .get(package)
                .cloned()
                .unwrap_or_else(|| package.to_string()),
            current_usage: inputs.today_usage.get(package).copied().unwrap_or(0),
            goal: inputs.goals.get(package).copied().unwrap_or(0),
            streak: streaks.get(package).copied().unwrap_or(0),
            tracked: inputs.tracked.contains(package),
        })
        .collect();
    apps.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.package.cmp(&b.package))
    });

    let monitored = apps.iter().filter(|app| app.tracked);
    let total_usage = monitored
        .clone()
        .map(|app| app.current_usage)
        .fold(0, u32::saturating_add);
    let total_goal = monitored.map(|app| app.goal).fold(0, u32::saturating_add);

    UsageView {
        generated_at: inputs.generated_at,
        today: inputs.today,
        history: inputs.history.to_vec(),
        apps,
        tracked: inputs.tracked.clone(),
        total_usage,
        total_goal,
    }
}
