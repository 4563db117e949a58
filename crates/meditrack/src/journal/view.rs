//! State and workflow shared by every collection view.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::model::{Record, RecordId, UserIdentity};
use crate::store::{self, RecordStore};

/// Where a view is in its load/write cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// Fetching the owner's records.
    #[default]
    Loading,
    /// Idle with a fresh list.
    Loaded,
    /// Submitting a new record.
    Creating,
    /// Submitting a change.
    Updating,
    /// Removing a record.
    Deleting,
    /// The last store call failed. Reloading recovers.
    Error(String),
}

impl ViewState {
    /// Whether a store call is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Creating | Self::Updating | Self::Deleting
        )
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The operation went through.
    Success,
    /// The operation was rejected or failed.
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub message: String,
}

impl Notice {
    /// A success notice.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// An error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Interactive yes/no confirmation, asked before anything is deleted.
pub trait Confirm {
    /// Ask `prompt`; `true` means go ahead.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// List, write, and delete workflow for one record kind.
///
/// Every successful write is followed by a fresh owner-filtered fetch, so the
/// list always mirrors the store. A failed store call leaves the list as it
/// was, moves to [`ViewState::Error`], and queues an error notice carrying the
/// store's message.
#[derive(Debug)]
pub struct CollectionView<T: Record> {
    store: Arc<dyn RecordStore>,
    user: UserIdentity,
    items: Vec<T>,
    state: ViewState,
    notices: Vec<Notice>,
}

impl<T: Record> CollectionView<T> {
    /// A view over `user`'s records in `store`. Nothing is fetched until
    /// [`CollectionView::load`].
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user: UserIdentity) -> Self {
        Self {
            store,
            user,
            items: Vec::new(),
            state: ViewState::Loading,
            notices: Vec::new(),
        }
    }

    /// Records currently shown, newest first.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Acting identity.
    #[must_use]
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Queued notices, oldest first.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Remove and return queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Look up a shown record.
    #[must_use]
    pub fn find(&self, id: &RecordId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Fetch the owner's records.
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it.
    pub async fn load(&mut self) -> Result<()> {
        self.state = ViewState::Loading;
        match self.fetch().await {
            Ok(()) => {
                self.state = ViewState::Loaded;
                Ok(())
            }
            Err(err) => Err(self.fail("load", err)),
        }
    }

    /// Fetch again; the way out of [`ViewState::Error`].
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it.
    pub async fn reload(&mut self) -> Result<()> {
        self.load().await
    }

    /// Store a validated payload owned by the acting identity.
    ///
    /// # Errors
    ///
    /// Returns the store failure after recording it.
    pub async fn create<P>(&mut self, payload: &P, success: &str) -> Result<T>
    where
        P: Serialize + Sync,
    {
        self.state = ViewState::Creating;
        let created =
            store::create_record::<T, P>(self.store.as_ref(), self.user.owner(), payload).await;
        let created = match created {
            Ok(record) => record,
            Err(err) => return Err(self.fail("create", err)),
        };
        debug!(collection = %T::COLLECTION, id = %created.id(), "Record created");
        self.settle(success).await?;
        Ok(created)
    }

    /// Merge `patch` into one of the acting identity's records.
    ///
    /// # Errors
    ///
    /// Fails as not-found or permission-denied before writing when the record
    /// is missing or owned by someone else; store failures are recorded.
    pub async fn update(
        &mut self,
        id: &RecordId,
        patch: Map<String, Value>,
        success: &str,
    ) -> Result<()> {
        self.state = ViewState::Updating;
        if let Err(err) = self.owned(id).await {
            return Err(self.fail("update", err));
        }
        if let Err(err) = self.store.update(T::COLLECTION, id, patch).await {
            return Err(self.fail("update", err));
        }
        self.settle(success).await
    }

    /// Fetch one of the acting identity's records straight from the store.
    ///
    /// # Errors
    ///
    /// Returns the failure after recording it.
    pub async fn fetch_owned(&mut self, id: &RecordId) -> Result<T> {
        match self.owned(id).await {
            Ok(record) => Ok(record),
            Err(err) => Err(self.fail("fetch", err)),
        }
    }

    /// Delete one of the acting identity's records after confirmation.
    ///
    /// Returns `false`, without touching the store, when confirmation is
    /// declined.
    ///
    /// # Errors
    ///
    /// Fails as not-found for an unknown id and as permission-denied when the
    /// record belongs to another identity.
    pub async fn delete(
        &mut self,
        id: &RecordId,
        confirm: &dyn Confirm,
        prompt: &str,
        success: &str,
    ) -> Result<bool> {
        if !confirm.confirm(prompt) {
            debug!(collection = %T::COLLECTION, %id, "Delete cancelled");
            return Ok(false);
        }

        self.state = ViewState::Deleting;
        if let Err(err) = self.owned(id).await {
            return Err(self.fail("delete", err));
        }
        if let Err(err) = self.store.delete(T::COLLECTION, id).await {
            return Err(self.fail("delete", err));
        }
        self.items.retain(|item| item.id() != id);
        self.settle(success).await?;
        Ok(true)
    }

    /// Record a form that failed validation. No store call was made.
    pub fn reject(&mut self, err: Error) -> Error {
        warn!(collection = %T::COLLECTION, error = %err, "Form rejected");
        self.notices.push(Notice::error(err.to_string()));
        err
    }

    /// Queue a success notice without a store call.
    pub fn note(&mut self, message: impl Into<String>) {
        self.notices.push(Notice::success(message));
    }

    async fn fetch(&mut self) -> Result<()> {
        let items = store::list_records::<T>(self.store.as_ref(), self.user.owner()).await?;
        self.items = items;
        Ok(())
    }

    /// Re-fetch after a successful write and report it.
    async fn settle(&mut self, success: &str) -> Result<()> {
        if let Err(err) = self.fetch().await {
            return Err(self.fail("refresh", err));
        }
        self.state = ViewState::Loaded;
        self.notices.push(Notice::success(success));
        Ok(())
    }

    async fn owned(&self, id: &RecordId) -> Result<T> {
        let record = store::get_record::<T>(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| Error::not_found(T::COLLECTION, id.as_str()))?;
        if record.owner_id() != self.user.owner() {
            return Err(Error::permission_denied(format!(
                "{} {id} belongs to another user",
                T::COLLECTION
            )));
        }
        Ok(record)
    }

    fn fail(&mut self, action: &str, err: Error) -> Error {
        error!(
            collection = %T::COLLECTION,
            action,
            kind = %err.kind(),
            error = %err,
            "Store operation failed"
        );
        let message = err.to_string();
        self.notices.push(Notice::error(message.clone()));
        self.state = ViewState::Error(message);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GoalForm, OwnerId, ProfessionalGoal};
    use crate::store::SqliteStore;

    fn user(id: &str) -> UserIdentity {
        UserIdentity {
            id: OwnerId::new(id),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }

    fn goal(text: &str) -> crate::model::NewGoal {
        GoalForm {
            goal: text.to_string(),
            target_date: None,
        }
        .validate()
        .unwrap()
    }

    fn view(store: &Arc<SqliteStore>, id: &str) -> CollectionView<ProfessionalGoal> {
        CollectionView::new(store.clone(), user(id))
    }

    #[tokio::test]
    async fn test_load_moves_to_loaded() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut goals = view(&store, "u1");
        assert_eq!(goals.state(), &ViewState::Loading);

        goals.load().await.unwrap();
        assert_eq!(goals.state(), &ViewState::Loaded);
        assert!(goals.items().is_empty());
    }

    #[tokio::test]
    async fn test_create_refetches_and_notifies() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut goals = view(&store, "u1");
        goals.load().await.unwrap();

        let created = goals.create(&goal("ACLS"), "Goal saved").await.unwrap();

        assert_eq!(created.owner_id, OwnerId::new("u1"));
        assert_eq!(goals.items().len(), 1);
        assert_eq!(goals.state(), &ViewState::Loaded);
        assert_eq!(goals.take_notices(), vec![Notice::success("Goal saved")]);
        assert!(goals.notices().is_empty());
    }

    #[tokio::test]
    async fn test_declined_delete_keeps_record() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut goals = view(&store, "u1");
        let created = goals.create(&goal("ACLS"), "ok").await.unwrap();

        let deleted = goals
            .delete(&created.id, &|_: &str| false, "Delete?", "Deleted")
            .await
            .unwrap();

        assert!(!deleted);
        assert_eq!(goals.items().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_foreign_record_is_permission_denied() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut owner = view(&store, "u1");
        let created = owner.create(&goal("ACLS"), "ok").await.unwrap();

        let mut intruder = view(&store, "u2");
        let err = intruder
            .delete(&created.id, &|_: &str| true, "Delete?", "Deleted")
            .await
            .unwrap_err();

        assert!(err.is_permission_error());
        assert!(matches!(intruder.state(), ViewState::Error(_)));
        assert_eq!(intruder.notices()[0].level, NoticeLevel::Error);

        owner.reload().await.unwrap();
        assert_eq!(owner.items().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_items_unchanged() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut goals = view(&store, "u1");
        goals.create(&goal("ACLS"), "ok").await.unwrap();

        let err = goals
            .update(&RecordId::from("missing"), Map::new(), "Updated")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(goals.items().len(), 1);
        assert!(matches!(goals.state(), ViewState::Error(msg) if msg.contains("not found")));

        goals.reload().await.unwrap();
        assert_eq!(goals.state(), &ViewState::Loaded);
    }

    #[test]
    fn test_view_state_busy() {
        assert!(ViewState::Loading.is_busy());
        assert!(ViewState::Deleting.is_busy());
        assert!(!ViewState::Loaded.is_busy());
        assert!(!ViewState::Error("x".into()).is_busy());
    }
}
