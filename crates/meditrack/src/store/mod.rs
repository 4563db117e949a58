//! Record store boundary.
//!
//! The journal never talks to a database directly. It goes through
//! [`RecordStore`], a small document-store contract: owner-filtered listing,
//! create with a server-assigned id and timestamp, shallow-merge update,
//! delete, and live snapshot subscriptions. [`SqliteStore`] is the bundled
//! backend.
//!
//! Documents are untyped JSON objects inside the store. The helpers at the
//! bottom of this module ([`list_records`], [`create_record`], ...) convert
//! them to and from the typed [`Record`] schemas, so malformed documents are
//! rejected here rather than deep inside a view.

pub mod events;
pub mod migrations;
pub mod schema;
mod sqlite;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{OwnerId, Record, RecordId};

pub use events::{ChangeEvent, ChangeFeed, ChangeKind};
pub use sqlite::{SqliteStore, StoreStats};

/// Keys the store owns. Values supplied for them by callers are discarded.
pub const RESERVED_KEYS: [&str; 3] = ["id", "ownerId", "createdAt"];

/// A named collection of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Patient consultations.
    Patients,
    /// Professional goals.
    ProfessionalGoals,
    /// Daily reflections.
    Reflections,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Collection; 3] = [Self::Patients, Self::ProfessionalGoals, Self::Reflections];

    /// Collection name as stored.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::ProfessionalGoals => "professionalGoals",
            Self::Reflections => "reflections",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "patients" => Ok(Self::Patients),
            "professionalgoals" | "goals" => Ok(Self::ProfessionalGoals),
            "reflections" => Ok(Self::Reflections),
            other => Err(Error::internal(format!("unknown collection `{other}`"))),
        }
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Collection the document lives in.
    pub collection: Collection,
    /// Owner reference written at creation.
    pub owner_id: OwnerId,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
    /// Every other field.
    pub fields: Map<String, Value>,
}

impl Document {
    /// Decode into the typed schema of its collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the document does not belong to
    /// `T`'s collection or its fields do not match the schema.
    pub fn into_record<T: Record>(self) -> Result<T> {
        let invalid = |id: &RecordId, message: String| Error::InvalidRecord {
            collection: T::COLLECTION,
            id: id.to_string(),
            message,
        };

        if self.collection != T::COLLECTION {
            return Err(invalid(
                &self.id,
                format!("document belongs to {}", self.collection),
            ));
        }

        let mut object = self.fields;
        object.insert("id".into(), Value::String(self.id.to_string()));
        object.insert("ownerId".into(), Value::String(self.owner_id.to_string()));
        object.insert("createdAt".into(), serde_json::to_value(self.created_at)?);

        serde_json::from_value(Value::Object(object)).map_err(|err| invalid(&self.id, err.to_string()))
    }
}

/// Receives a full, newest-first snapshot after every change.
pub type SnapshotCallback = Box<dyn FnMut(Vec<Document>) + Send + 'static>;

/// A live subscription. Dropping it, or calling [`Subscription::unsubscribe`],
/// stops delivery.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wrap the task delivering snapshots.
    #[must_use]
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop delivery.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether snapshots are still being delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Document-store contract used by every journal view.
///
/// Failures are reported once; implementations never retry.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Documents owned by `owner`, newest first.
    async fn list(&self, collection: Collection, owner: &OwnerId) -> Result<Vec<Document>>;

    /// One document by id.
    async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Document>>;

    /// Store a new document, assigning its id and creation timestamp.
    async fn create(
        &self,
        collection: Collection,
        owner: &OwnerId,
        fields: Map<String, Value>,
    ) -> Result<Document>;

    /// Shallow-merge `patch` into an existing document.
    ///
    /// Fails with [`Error::NotFound`] when the id does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> Result<()>;

    /// Remove a document.
    ///
    /// Fails with [`Error::NotFound`] when the id does not exist.
    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()>;

    /// Deliver the current snapshot now and a fresh one after every change
    /// to `owner`'s documents in `collection`.
    async fn subscribe(
        &self,
        collection: Collection,
        owner: &OwnerId,
        on_change: SnapshotCallback,
    ) -> Result<Subscription>;
}

/// Drop caller-supplied values for store-owned keys.
#[must_use]
pub fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
    fields
}

/// Sort newest first; ties break on id so the order is stable.
pub fn sort_newest_first<T: Record>(records: &mut [T]) {
    records.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Decode a snapshot into typed records, newest first.
///
/// Documents that do not match `T`'s schema are logged and left out.
#[must_use]
pub fn decode_all<T: Record>(documents: Vec<Document>) -> Vec<T> {
    let mut records: Vec<T> = documents
        .into_iter()
        .filter_map(|document| match document.into_record() {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(collection = %T::COLLECTION, error = %err, "Skipping unreadable document");
                None
            }
        })
        .collect();
    sort_newest_first(&mut records);
    records
}

/// List `owner`'s records of kind `T`, newest first.
///
/// # Errors
///
/// Propagates store failures. Unreadable documents are skipped.
pub async fn list_records<T: Record>(store: &dyn RecordStore, owner: &OwnerId) -> Result<Vec<T>> {
    Ok(decode_all(store.list(T::COLLECTION, owner).await?))
}

/// Fetch one record of kind `T`.
///
/// # Errors
///
/// Propagates store failures and schema mismatches.
pub async fn get_record<T: Record>(store: &dyn RecordStore, id: &RecordId) -> Result<Option<T>> {
    store
        .get(T::COLLECTION, id)
        .await?
        .map(Document::into_record)
        .transpose()
}

/// Create a record of kind `T` from a validated payload.
///
/// # Errors
///
/// Propagates store failures; fails if the payload does not serialize to an
/// object or the stored document does not decode as `T`.
pub async fn create_record<T, P>(store: &dyn RecordStore, owner: &OwnerId, payload: &P) -> Result<T>
where
    T: Record,
    P: Serialize + Sync,
{
    let Value::Object(fields) = serde_json::to_value(payload)? else {
        return Err(Error::internal(format!(
            "{} payload must serialize to an object",
            T::COLLECTION
        )));
    };
    store
        .create(T::COLLECTION, owner, fields)
        .await?
        .into_record()
}
