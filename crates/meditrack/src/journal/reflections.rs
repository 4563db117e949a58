//! Daily reflections view. Reflections are created and deleted, never edited.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{RecordId, Reflection, ReflectionForm, UserIdentity};
use crate::store::RecordStore;

use super::view::{CollectionView, Confirm, Notice, ViewState};

/// Reflection journal for the signed-in clinician.
#[derive(Debug)]
pub struct ReflectionsView {
    records: CollectionView<Reflection>,
}

impl ReflectionsView {
    /// A view over `user`'s reflections.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user: UserIdentity) -> Self {
        Self {
            records: CollectionView::new(store, user),
        }
    }

    /// Fetch the reflections.
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

    /// Every reflection, newest first.
    #[must_use]
    pub fn items(&self) -> &[Reflection] {
        self.records.items()
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

    /// Validate and store a reflection; the date defaults to `today`.
    ///
    /// # Errors
    ///
    /// Returns the validation or store failure after recording it.
    pub async fn create(&mut self, form: &ReflectionForm, today: NaiveDate) -> Result<Reflection> {
        let new = form
            .validate(today)
            .map_err(|err| self.records.reject(err))?;
        self.records.create(&new, "Reflection saved").await
    }

    /// Delete a reflection after confirmation.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied, or with the store failure.
    pub async fn delete(&mut self, id: &RecordId, confirm: &dyn Confirm) -> Result<bool> {
        let prompt = match self.records.find(id) {
            Some(reflection) => format!("Delete reflection from {}?", reflection.date),
            None => format!("Delete reflection {id}?"),
        };
        self.records
            .delete(id, confirm, &prompt, "Reflection deleted")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OwnerId;
    use crate::store::SqliteStore;

    fn user(id: &str) -> UserIdentity {
        UserIdentity {
            id: OwnerId::new(id),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn form(learning: &str) -> ReflectionForm {
        ReflectionForm {
            learning: learning.into(),
            challenges: Some("Turno largo".into()),
            ..ReflectionForm::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut view = ReflectionsView::new(store, user("doc-1"));
        view.load().await.unwrap();

        view.create(&form("Primero"), today()).await.unwrap();
        let second = view.create(&form("Segundo"), today()).await.unwrap();

        assert_eq!(view.items().len(), 2);
        assert_eq!(view.items()[0].id, second.id);
        assert_eq!(second.date, today());
        assert_eq!(second.achievements, "");
    }

    #[tokio::test]
    async fn test_owners_see_only_their_reflections() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut ana = ReflectionsView::new(store.clone(), user("ana"));
        let mut luis = ReflectionsView::new(store, user("luis"));

        ana.create(&form("Escucha activa"), today()).await.unwrap();
        luis.load().await.unwrap();

        assert!(luis.items().is_empty());
    }

    #[tokio::test]
    async fn test_learning_required() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut view = ReflectionsView::new(store, user("doc-1"));
        let err = view.create(&form(""), today()).await.unwrap_err();
        assert!(err.is_validation());
    }
}
