//! Professional goals.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{self, blank_date};
use super::{OwnerId, Record, RecordId};
use crate::error::Result;
use crate::store::Collection;

/// Goal progress. Only the owner toggles between the two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Not reached yet.
    #[default]
    Pending,
    /// Reached.
    Completed,
}

impl GoalStatus {
    /// The other status.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalGoal {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Owner reference.
    pub owner_id: OwnerId,
    /// What the clinician wants to achieve.
    pub goal: String,
    /// Optional target date, stored as `""` when unset.
    #[serde(default, with = "blank_date")]
    pub target_date: Option<NaiveDate>,
    /// Progress.
    pub status: GoalStatus,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
}

impl Record for ProfessionalGoal {
    const COLLECTION: Collection = Collection::ProfessionalGoals;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl ProfessionalGoal {
    /// Whether the goal is still pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == GoalStatus::Pending
    }
}

/// Raw goal form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalForm {
    /// Goal description.
    pub goal: String,
    /// `YYYY-MM-DD` target date.
    pub target_date: Option<String>,
}

/// Validated goal payload. New goals always start pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    /// Goal description.
    pub goal: String,
    /// Target date.
    #[serde(with = "blank_date")]
    pub target_date: Option<NaiveDate>,
    /// Initial status.
    pub status: GoalStatus,
}

impl GoalForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank description or a malformed date.
    pub fn validate(&self) -> Result<NewGoal> {
        Ok(NewGoal {
            goal: fields::required_text("goal", &self.goal)?,
            target_date: fields::optional_date("targetDate", self.target_date.as_deref())?,
            status: GoalStatus::Pending,
        })
    }
}
