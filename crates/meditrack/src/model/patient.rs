//! Anonymized patient consultations.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{self, blank_date, hh_mm};
use super::{Category, FormRules, OwnerId, Record, RecordId};
use crate::error::Result;
use crate::store::Collection;

/// A persisted consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientConsultation {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Owner reference.
    pub owner_id: OwnerId,
    /// Anonymized patient code, e.g. `PAC-001`.
    pub anonymous_id: String,
    /// Date of the consultation.
    pub consultation_date: NaiveDate,
    /// Local start time of the consultation.
    #[serde(with = "hh_mm")]
    pub consultation_time: NaiveTime,
    /// Reason for the consultation.
    pub reason: String,
    /// Diagnosis or clinical impression.
    #[serde(default)]
    pub diagnosis: String,
    /// Treatment given.
    #[serde(default)]
    pub treatment: String,
    /// Free-form observations.
    #[serde(default)]
    pub observations: String,
    /// What the case taught.
    #[serde(default)]
    pub lessons_learned: String,
    /// Category; documents written before categories existed have none.
    #[serde(default)]
    pub category: Option<Category>,
    /// Length of the consultation in minutes.
    pub duration_minutes: u32,
    /// Optional follow-up date, stored as `""` when unset.
    #[serde(default, with = "blank_date")]
    pub follow_up_date: Option<NaiveDate>,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
}

impl Record for PatientConsultation {
    const COLLECTION: Collection = Collection::Patients;

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

impl PatientConsultation {
    /// Case-insensitive substring match over code, reason, and diagnosis.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || [&self.anonymous_id, &self.reason, &self.diagnosis]
                .iter()
                .any(|text| text.to_lowercase().contains(&term))
    }
}

/// Raw consultation form input. Only `anonymous_id` and `reason` are mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    /// Anonymized patient code.
    pub anonymous_id: String,
    /// `YYYY-MM-DD`; defaults to today.
    pub consultation_date: Option<String>,
    /// `HH:MM`; defaults to the current time.
    pub consultation_time: Option<String>,
    /// Reason for the consultation.
    pub reason: String,
    /// Diagnosis.
    pub diagnosis: Option<String>,
    /// Treatment.
    pub treatment: Option<String>,
    /// Observations.
    pub observations: Option<String>,
    /// Duration as typed; anything not a positive number becomes the default.
    pub duration_minutes: Option<String>,
    /// Lessons learned.
    pub lessons_learned: Option<String>,
    /// Category name.
    pub category: Option<String>,
    /// `YYYY-MM-DD` follow-up date.
    pub follow_up_date: Option<String>,
}

/// Validated consultation payload, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    /// Anonymized patient code.
    pub anonymous_id: String,
    /// Date of the consultation.
    pub consultation_date: NaiveDate,
    /// Start time.
    #[serde(with = "hh_mm")]
    pub consultation_time: NaiveTime,
    /// Reason for the consultation.
    pub reason: String,
    /// Diagnosis.
    pub diagnosis: String,
    /// Treatment.
    pub treatment: String,
    /// Observations.
    pub observations: String,
    /// Lessons learned.
    pub lessons_learned: String,
    /// Category.
    pub category: Category,
    /// Duration in minutes, always positive.
    pub duration_minutes: u32,
    /// Follow-up date.
    #[serde(with = "blank_date")]
    pub follow_up_date: Option<NaiveDate>,
}

impl PatientForm {
    /// Validate the form, trimming text and filling defaults.
    ///
    /// `now` is the local wall-clock time used for the date and time defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank code or reason, an identifying
    /// code, an unknown category, or a malformed date or time.
    pub fn validate(&self, rules: &FormRules, now: NaiveDateTime) -> Result<NewPatient> {
        let anonymous_id = fields::required_text("anonymousId", &self.anonymous_id)?;
        rules.check_anonymous_id(&anonymous_id)?;
        let reason = fields::required_text("reason", &self.reason)?;

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => rules.default_category,
            Some(name) => name.parse()?,
        };

        Ok(NewPatient {
            anonymous_id,
            consultation_date: fields::date_or(
                "consultationDate",
                self.consultation_date.as_deref(),
                now.date(),
            )?,
            consultation_time: fields::time_or(
                "consultationTime",
                self.consultation_time.as_deref(),
                fields::to_minute(now.time()),
            )?,
            reason,
            diagnosis: fields::optional_text(self.diagnosis.as_deref()),
            treatment: fields::optional_text(self.treatment.as_deref()),
            observations: fields::optional_text(self.observations.as_deref()),
            lessons_learned: fields::optional_text(self.lessons_learned.as_deref()),
            category,
            duration_minutes: normalize_duration(
                self.duration_minutes.as_deref(),
                rules.default_duration_minutes,
            ),
            follow_up_date: fields::optional_date(
                "followUpDate",
                self.follow_up_date.as_deref(),
            )?,
        })
    }
}

/// Changed consultation fields. `None` leaves the stored value untouched.
///
/// For the free-text fields and `follow_up_date`, `Some("")` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientPatch {
    /// New anonymized code.
    pub anonymous_id: Option<String>,
    /// New consultation date.
    pub consultation_date: Option<String>,
    /// New consultation time.
    pub consultation_time: Option<String>,
    /// New reason.
    pub reason: Option<String>,
    /// New diagnosis.
    pub diagnosis: Option<String>,
    /// New treatment.
    pub treatment: Option<String>,
    /// New observations.
    pub observations: Option<String>,
    /// New duration, normalized like the create form.
    pub duration_minutes: Option<String>,
    /// New lessons learned.
    pub lessons_learned: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New follow-up date.
    pub follow_up_date: Option<String>,
}

impl PatientPatch {
    /// Whether the patch changes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate the changed fields and build the document patch.
    ///
    /// # Errors
    ///
    /// Returns a validation error under the same rules as [`PatientForm::validate`].
    pub fn validate(&self, rules: &FormRules) -> Result<Map<String, Value>> {
        let mut patch = Map::new();

        if let Some(raw) = &self.anonymous_id {
            let code = fields::required_text("anonymousId", raw)?;
            rules.check_anonymous_id(&code)?;
            patch.insert("anonymousId".into(), Value::String(code));
        }
        if let Some(raw) = &self.reason {
            patch.insert(
                "reason".into(),
                Value::String(fields::required_text("reason", raw)?),
            );
        }
        if let Some(raw) = &self.consultation_date {
            if let Some(date) = fields::optional_date("consultationDate", Some(raw))? {
                patch.insert(
                    "consultationDate".into(),
                    Value::String(date.format(fields::DATE_FORMAT).to_string()),
                );
            }
        }
        if let Some(raw) = &self.consultation_time {
            if !raw.trim().is_empty() {
                let time = fields::time_or("consultationTime", Some(raw), NaiveTime::MIN)?;
                patch.insert(
                    "consultationTime".into(),
                    Value::String(time.format(fields::TIME_FORMAT).to_string()),
                );
            }
        }
        for (key, value) in [
            ("diagnosis", &self.diagnosis),
            ("treatment", &self.treatment),
            ("observations", &self.observations),
            ("lessonsLearned", &self.lessons_learned),
        ] {
            if let Some(raw) = value {
                patch.insert(key.into(), Value::String(raw.trim().to_string()));
            }
        }
        if let Some(raw) = &self.duration_minutes {
            let minutes = normalize_duration(Some(raw), rules.default_duration_minutes);
            patch.insert("durationMinutes".into(), Value::from(minutes));
        }
        if let Some(raw) = &self.category {
            let category = match raw.trim() {
                "" => rules.default_category,
                name => name.parse()?,
            };
            patch.insert("category".into(), Value::String(category.as_str().into()));
        }
        if let Some(raw) = &self.follow_up_date {
            let date = fields::optional_date("followUpDate", Some(raw))?;
            patch.insert(
                "followUpDate".into(),
                Value::String(
                    date.map(|d| d.format(fields::DATE_FORMAT).to_string())
                        .unwrap_or_default(),
                ),
            );
        }

        Ok(patch)
    }
}

/// Normalize a typed duration into whole positive minutes.
///
/// Missing, non-numeric, or sub-minute input yields `default`; fractional
/// input is truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_duration(raw: Option<&str>, default: u32) -> u32 {
    raw.map(str::trim)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|minutes| minutes.is_finite() && *minutes >= 1.0)
        .map_or(default, |minutes| minutes.min(f64::from(u32::MAX)).trunc() as u32)
}
