//! Dashboard statistics across consultations and goals.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::error;

use crate::error::Result;
use crate::model::{Category, PatientConsultation, ProfessionalGoal, UserIdentity};
use crate::store::{self, RecordStore};

use super::view::{Notice, ViewState};

/// Shown as the most common category when no consultation has one.
pub const NO_CATEGORY: &str = "N/A";

/// Consultations on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    /// The day.
    pub date: NaiveDate,
    /// Short weekday name, e.g. `Mon`.
    pub label: String,
    /// Consultations dated that day.
    pub count: usize,
}

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Number of consultations.
    pub total_consultations: usize,
    /// Sum of consultation durations.
    pub total_minutes: u64,
    /// Most frequent category, or [`NO_CATEGORY`].
    pub most_common_category: String,
    /// Goals not yet completed.
    pub pending_goals: usize,
    /// Consultations per day over the trailing window, oldest first.
    pub weekly: Vec<DayBucket>,
}

/// Compute dashboard statistics.
///
/// The histogram covers `days` days ending with `today`. Ties for the most
/// common category go to the category seen first in `patients`.
#[must_use]
pub fn compute_stats(
    patients: &[PatientConsultation],
    goals: &[ProfessionalGoal],
    today: NaiveDate,
    days: u32,
) -> DashboardStats {
    DashboardStats {
        total_consultations: patients.len(),
        total_minutes: patients
            .iter()
            .map(|patient| u64::from(patient.duration_minutes))
            .sum(),
        most_common_category: most_common_category(patients.iter().filter_map(|p| p.category))
            .map_or_else(|| NO_CATEGORY.to_string(), |category| category.to_string()),
        pending_goals: goals.iter().filter(|goal| goal.is_pending()).count(),
        weekly: histogram(patients, today, days),
    }
}

fn most_common_category(categories: impl Iterator<Item = Category>) -> Option<Category> {
    // Encounter order is kept so that ties resolve to the earliest category.
    let mut counts: Vec<(Category, usize)> = Vec::new();
    for category in categories {
        match counts.iter_mut().find(|(seen, _)| *seen == category) {
            Some((_, count)) => *count += 1,
            None => counts.push((category, 1)),
        }
    }

    let mut best: Option<(Category, usize)> = None;
    for (category, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((category, count));
        }
    }
    best.map(|(category, _)| category)
}

fn histogram(patients: &[PatientConsultation], today: NaiveDate, days: u32) -> Vec<DayBucket> {
    (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
        .map(|date| DayBucket {
            date,
            label: date.format("%a").to_string(),
            count: patients
                .iter()
                .filter(|patient| patient.consultation_date == date)
                .count(),
        })
        .collect()
}

/// Dashboard page: loads both collections and derives [`DashboardStats`].
#[derive(Debug)]
pub struct Dashboard {
    store: Arc<dyn RecordStore>,
    user: UserIdentity,
    histogram_days: u32,
    state: ViewState,
    stats: Option<DashboardStats>,
    notices: Vec<Notice>,
}

impl Dashboard {
    /// A dashboard for `user` with a `histogram_days`-day histogram.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user: UserIdentity, histogram_days: u32) -> Self {
        Self {
            store,
            user,
            histogram_days,
            state: ViewState::Loading,
            stats: None,
            notices: Vec::new(),
        }
    }

    /// Fetch consultations and goals and recompute the statistics.
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it; earlier statistics are
    /// kept.
    pub async fn load(&mut self, today: NaiveDate) -> Result<&DashboardStats> {
        self.state = ViewState::Loading;
        let owner = self.user.owner();
        let fetched = async {
            let patients =
                store::list_records::<PatientConsultation>(self.store.as_ref(), owner).await?;
            let goals = store::list_records::<ProfessionalGoal>(self.store.as_ref(), owner).await?;
            Ok::<_, crate::error::Error>((patients, goals))
        }
        .await;

        match fetched {
            Ok((patients, goals)) => {
                self.state = ViewState::Loaded;
                Ok(self
                    .stats
                    .insert(compute_stats(&patients, &goals, today, self.histogram_days)))
            }
            Err(err) => {
                error!(kind = %err.kind(), error = %err, "Dashboard load failed");
                let message = err.to_string();
                self.notices.push(Notice::error(message.clone()));
                self.state = ViewState::Error(message);
                Err(err)
            }
        }
    }

    /// Last computed statistics.
    #[must_use]
    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Remove and return queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
