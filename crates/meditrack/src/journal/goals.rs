//! Professional goals view.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{GoalForm, GoalStatus, ProfessionalGoal, RecordId, UserIdentity};
use crate::store::RecordStore;

use super::view::{CollectionView, Confirm, Notice, ViewState};

/// Goal list for the signed-in clinician.
#[derive(Debug)]
pub struct GoalsView {
    records: CollectionView<ProfessionalGoal>,
}

impl GoalsView {
    /// A view over `user`'s goals.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user: UserIdentity) -> Self {
        Self {
            records: CollectionView::new(store, user),
        }
    }

    /// Fetch the goals.
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it.
    pub async fn load(&mut self) -> Result<()> {
        self.records.load().await
    }

    /// Fetch again after a failure.
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it.
    pub async fn reload(&mut self) -> Result<()> {
        self.records.reload().await
    }

    /// Every goal, newest first.
    #[must_use]
    pub fn items(&self) -> &[ProfessionalGoal] {
        self.records.items()
    }

    /// Goals still pending.
    pub fn pending(&self) -> impl Iterator<Item = &ProfessionalGoal> {
        self.items().iter().filter(|goal| goal.is_pending())
    }

    /// Goals already reached.
    pub fn completed(&self) -> impl Iterator<Item = &ProfessionalGoal> {
        self.items().iter().filter(|goal| !goal.is_pending())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ViewState {
        self.records.state()
    }

    /// Queued notices.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        self.records.notices()
    }

    /// Remove and return queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.records.take_notices()
    }

    /// Validate and store a new, pending goal.
    ///
    /// # Errors
    ///
    /// Returns the validation or store failure after recording it.
    pub async fn create(&mut self, form: &GoalForm) -> Result<ProfessionalGoal> {
        let new = form.validate().map_err(|err| self.records.reject(err))?;
        self.records.create(&new, "Goal saved").await
    }

    /// Flip a goal between pending and completed, returning the new status.
    ///
    /// The current status is read from the store, not the local list.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied, or with the store failure.
    pub async fn toggle(&mut self, id: &RecordId) -> Result<GoalStatus> {
        let goal = self.records.fetch_owned(id).await?;
        let status = goal.status.toggled();

        let mut patch = Map::new();
        patch.insert("status".into(), Value::String(status.as_str().into()));
        let message = match status {
            GoalStatus::Completed => "Goal completed",
            GoalStatus::Pending => "Goal reopened",
        };
        self.records.update(id, patch, message).await?;
        Ok(status)
    }

    /// Delete a goal after confirmation.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied, or with the store failure.
    pub async fn delete(&mut self, id: &RecordId, confirm: &dyn Confirm) -> Result<bool> {
        let prompt = match self.records.find(id) {
            Some(goal) => format!("Delete goal \"{}\"?", goal.goal),
            None => format!("Delete goal {id}?"),
        };
        self.records.delete(id, confirm, &prompt, "Goal deleted").await
    }
}
