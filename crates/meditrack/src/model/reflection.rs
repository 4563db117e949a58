//! Daily reflections. Created and deleted, never edited.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::fields;
use super::{OwnerId, Record, RecordId};
use crate::error::Result;
use crate::store::Collection;

/// A persisted reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Owner reference.
    pub owner_id: OwnerId,
    /// Day the reflection is about.
    pub date: NaiveDate,
    /// What was learned.
    pub learning: String,
    /// Challenges faced.
    #[serde(default)]
    pub challenges: String,
    /// Achievements.
    #[serde(default)]
    pub achievements: String,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
}

impl Record for Reflection {
    const COLLECTION: Collection = Collection::Reflections;

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

/// Raw reflection form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionForm {
    /// `YYYY-MM-DD`; defaults to today.
    pub date: Option<String>,
    /// What was learned (mandatory).
    pub learning: String,
    /// Challenges faced.
    pub challenges: Option<String>,
    /// Achievements.
    pub achievements: Option<String>,
}

/// Validated reflection payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReflection {
    /// Day the reflection is about.
    pub date: NaiveDate,
    /// What was learned.
    pub learning: String,
    /// Challenges faced.
    pub challenges: String,
    /// Achievements.
    pub achievements: String,
}

impl ReflectionForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank learning text or a malformed date.
    pub fn validate(&self, today: NaiveDate) -> Result<NewReflection> {
        Ok(NewReflection {
            date: fields::date_or("date", self.date.as_deref(), today)?,
            learning: fields::required_text("learning", &self.learning)?,
            challenges: fields::optional_text(self.challenges.as_deref()),
            achievements: fields::optional_text(self.achievements.as_deref()),
        })
    }
}
