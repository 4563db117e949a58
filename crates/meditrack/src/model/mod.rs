//! Record kinds kept in the journal.
//!
//! Each persisted kind implements [`Record`], which ties it to its store
//! collection and gives the store boundary one explicit schema to validate
//! documents against. Raw form input lives in the `*Form` types; validating a
//! form yields the `New*` payload that is actually written.

mod fields;
mod goal;
mod identity;
mod patient;
mod reflection;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Collection;

pub use fields::{blank_date, hh_mm, DATE_FORMAT, TIME_FORMAT};
pub use goal::{GoalForm, GoalStatus, NewGoal, ProfessionalGoal};
pub use identity::{OwnerId, UserIdentity};
pub use patient::{normalize_duration, NewPatient, PatientConsultation, PatientForm, PatientPatch};
pub use reflection::{NewReflection, Reflection, ReflectionForm};

/// Opaque record identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed record stored in one collection.
///
/// The `id`, `ownerId`, and `createdAt` keys are assigned by the store; every
/// other field comes from the serialized `New*` payload.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection holding this kind.
    const COLLECTION: Collection;

    /// Store-assigned identifier.
    fn id(&self) -> &RecordId;

    /// Owner reference stamped at creation.
    fn owner_id(&self) -> &OwnerId;

    /// Server timestamp assigned at creation.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Consultation category, stored under its Spanish label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    /// General practice.
    #[default]
    General,
    /// Pediatric consultation.
    #[serde(rename = "Pediátrico", alias = "Pediatric")]
    Pediatric,
    /// Chronic-condition management.
    #[serde(rename = "Crónico", alias = "Chronic")]
    Chronic,
    /// Emergency care.
    #[serde(rename = "Emergencia", alias = "Emergency")]
    Emergency,
    /// Surgical case.
    #[serde(rename = "Cirugía", alias = "Surgery")]
    Surgery,
    /// Follow-up visit.
    #[serde(rename = "Seguimiento", alias = "FollowUp")]
    FollowUp,
}

impl Category {
    /// Every category, in form order.
    pub const ALL: [Category; 6] = [
        Self::General,
        Self::Pediatric,
        Self::Chronic,
        Self::Emergency,
        Self::Surgery,
        Self::FollowUp,
    ];

    /// Stored and displayed label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Pediatric => "Pediátrico",
            Self::Chronic => "Crónico",
            Self::Emergency => "Emergencia",
            Self::Surgery => "Cirugía",
            Self::FollowUp => "Seguimiento",
        }
    }

    /// English name, accepted on input.
    fn english_name(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Pediatric => "Pediatric",
            Self::Chronic => "Chronic",
            Self::Emergency => "Emergency",
            Self::Surgery => "Surgery",
            Self::FollowUp => "FollowUp",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace(['-', '_', ' '], "").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| {
                category.as_str().to_lowercase() == wanted || category.english_name().to_lowercase() == wanted
            })
            .ok_or_else(|| {
                Error::validation(
                    "category",
                    format!(
                        "unknown category `{}`; expected one of {}",
                        s.trim(),
                        Self::ALL.map(Category::as_str).join(", ")
                    ),
                )
            })
    }
}

/// Defaults and checks applied when a form is submitted.
#[derive(Debug, Clone)]
pub struct FormRules {
    /// Category used when the form leaves it unset.
    pub default_category: Category,
    /// Duration used when the form value is missing or not a positive number.
    pub default_duration_minutes: u32,
    /// Patterns an anonymized patient code must not match.
    pub identifier_patterns: Vec<Regex>,
}

impl Default for FormRules {
    fn default() -> Self {
        Self {
            default_category: Category::General,
            default_duration_minutes: 20,
            identifier_patterns: Vec::new(),
        }
    }
}

impl FormRules {
    /// Build the rules from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a privacy pattern fails to compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            default_category: config.journal.default_category,
            default_duration_minutes: config.journal.default_duration_minutes,
            identifier_patterns: config.identifier_patterns()?,
        })
    }

    /// Reject anonymized codes that look like identifying data.
    ///
    /// # Errors
    ///
    /// Returns a validation error on the `anonymousId` field.
    pub fn check_anonymous_id(&self, code: &str) -> Result<()> {
        if self.identifier_patterns.iter().any(|re| re.is_match(code)) {
            return Err(Error::validation(
                "anonymousId",
                "looks like identifying data; use an anonymized code",
            ));
        }
        Ok(())
    }
}
