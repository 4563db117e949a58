//! Patient consultations view.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::model::{
    FormRules, PatientConsultation, PatientForm, PatientPatch, RecordId, UserIdentity,
};
use crate::store::RecordStore;

use super::view::{CollectionView, Confirm, Notice, ViewState};

/// Consultation log for the signed-in clinician.
#[derive(Debug)]
pub struct PatientsView {
    records: CollectionView<PatientConsultation>,
    rules: FormRules,
    search: String,
}

impl PatientsView {
    /// A view over `user`'s consultations.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user: UserIdentity, rules: FormRules) -> Self {
        Self {
            records: CollectionView::new(store, user),
            rules,
            search: String::new(),
        }
    }

    /// Fetch the consultations.
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

    /// Every loaded consultation, newest first.
    #[must_use]
    pub fn items(&self) -> &[PatientConsultation] {
        self.records.items()
    }

    /// Set the search term applied by [`PatientsView::visible`].
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// Consultations matching the search term.
    #[must_use]
    pub fn visible(&self) -> Vec<&PatientConsultation> {
        self.items()
            .iter()
            .filter(|patient| patient.matches(&self.search))
            .collect()
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

    /// Fetch one consultation owned by the signed-in clinician.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied.
    pub async fn get(&mut self, id: &RecordId) -> Result<PatientConsultation> {
        self.records.fetch_owned(id).await
    }

    /// Validate and store a new consultation.
    ///
    /// `now` supplies the date and time defaults. A form that fails
    /// validation never reaches the store.
    ///
    /// # Errors
    ///
    /// Returns the validation or store failure after recording it.
    pub async fn create(
        &mut self,
        form: &PatientForm,
        now: NaiveDateTime,
    ) -> Result<PatientConsultation> {
        let new = form
            .validate(&self.rules, now)
            .map_err(|err| self.records.reject(err))?;
        self.records.create(&new, "Consultation saved").await
    }

    /// Apply the changed fields of `patch`.
    ///
    /// An empty patch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the validation or store failure after recording it.
    pub async fn update(&mut self, id: &RecordId, patch: &PatientPatch) -> Result<()> {
        let changes = patch
            .validate(&self.rules)
            .map_err(|err| self.records.reject(err))?;
        if changes.is_empty() {
            self.records.note("Nothing to update");
            return Ok(());
        }
        self.records.update(id, changes, "Consultation updated").await
    }

    /// Delete a consultation after confirmation.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied, or with the store failure.
    pub async fn delete(&mut self, id: &RecordId, confirm: &dyn Confirm) -> Result<bool> {
        let prompt = match self.records.find(id) {
            Some(patient) => format!("Delete consultation {}?", patient.anonymous_id),
            None => format!("Delete consultation {id}?"),
        };
        self.records
            .delete(id, confirm, &prompt, "Consultation deleted")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, OwnerId};
    use crate::store::SqliteStore;
    use chrono::NaiveDate;

    fn user() -> UserIdentity {
        UserIdentity {
            id: OwnerId::new("doc-1"),
            display_name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            avatar_url: None,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn form(code: &str, reason: &str) -> PatientForm {
        PatientForm {
            anonymous_id: code.into(),
            reason: reason.into(),
            ..PatientForm::default()
        }
    }

    async fn loaded_view() -> PatientsView {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let rules = FormRules::from_config(&crate::config::Config::default()).unwrap();
        let mut view = PatientsView::new(store, user(), rules);
        view.load().await.unwrap();
        view
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_owner() {
        let mut view = loaded_view().await;
        let created = view
            .create(&form("PAC-001", "Dolor abdominal"), now())
            .await
            .unwrap();

        assert_eq!(created.owner_id, OwnerId::new("doc-1"));
        assert_eq!(created.category, Some(Category::General));
        assert_eq!(created.duration_minutes, 20);
        assert_eq!(created.follow_up_date, None);
        assert_eq!(view.items().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_store() {
        let mut view = loaded_view().await;
        let err = view.create(&form("PAC-001", "  "), now()).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(view.state(), &ViewState::Loaded);
        assert_eq!(view.notices().len(), 1);
        view.reload().await.unwrap();
        assert!(view.items().is_empty());
    }

    #[tokio::test]
    async fn test_identifying_code_rejected() {
        let mut view = loaded_view().await;
        let err = view
            .create(&form("juan.perez@example.com", "Control"), now())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("anonymousId"));
    }

    #[tokio::test]
    async fn test_update_merges_changed_fields() {
        let mut view = loaded_view().await;
        let created = view.create(&form("PAC-002", "Cefalea"), now()).await.unwrap();

        let patch = PatientPatch {
            diagnosis: Some(" Migraña ".into()),
            duration_minutes: Some("35".into()),
            ..PatientPatch::default()
        };
        view.update(&created.id, &patch).await.unwrap();

        let updated = &view.items()[0];
        assert_eq!(updated.diagnosis, "Migraña");
        assert_eq!(updated.duration_minutes, 35);
        assert_eq!(updated.reason, "Cefalea");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_empty_patch_is_noop() {
        let mut view = loaded_view().await;
        let created = view.create(&form("PAC-003", "Tos"), now()).await.unwrap();
        view.take_notices();

        view.update(&created.id, &PatientPatch::default()).await.unwrap();
        assert_eq!(view.take_notices(), vec![Notice::success("Nothing to update")]);
    }

    #[tokio::test]
    async fn test_search() {
        let mut view = loaded_view().await;
        view.create(&form("PAC-001", "Dolor abdominal"), now()).await.unwrap();
        view.create(&form("PAC-002", "Control de diabetes"), now()).await.unwrap();

        view.set_search("DOLOR");
        let visible = view.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].anonymous_id, "PAC-001");

        view.set_search("");
        assert_eq!(view.visible().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_then_second_delete_not_found() {
        let mut view = loaded_view().await;
        let created = view.create(&form("PAC-004", "Fiebre"), now()).await.unwrap();

        assert!(view.delete(&created.id, &|_: &str| true).await.unwrap());
        assert!(view.items().is_empty());

        let err = view.delete(&created.id, &|_: &str| true).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
