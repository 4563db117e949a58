//! Embedded `SQLite` document store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{OwnerId, RecordId};

use super::events::{ChangeEvent, ChangeFeed, ChangeKind};
use super::{
    migrations, strip_reserved, Collection, Document, RecordStore, SnapshotCallback, Subscription,
};

type Row = (String, String, String, String);

/// [`RecordStore`] backed by a single `SQLite` file.
///
/// Cloning is cheap; clones share one connection and one change feed.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    read_only: bool,
    conn: Mutex<Connection>,
    last_timestamp: Mutex<DateTime<Utc>>,
    feed: ChangeFeed,
}

/// Document counts and file size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Consultations across all owners.
    pub patients: i64,
    /// Goals across all owners.
    pub goals: i64,
    /// Reflections across all owners.
    pub reflections: i64,
    /// Stored schema version.
    pub schema_version: i32,
    /// Size of the database file.
    pub db_size_bytes: u64,
}

impl SqliteStore {
    /// Open or create a store at `path`.
    ///
    /// Creates parent directories as needed and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self::from_connection(path, conn, false))
    }

    /// Open an existing store without write access.
    ///
    /// Every write fails as a permission failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be opened.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        info!("Database opened read-only at {}", path.display());
        Ok(Self::from_connection(path, conn, true))
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::from_connection(path, conn, false))
    }

    /// Open the store described by `config.storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if opening fails.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database_path();
        if config.storage.read_only {
            Self::open_read_only(path)
        } else {
            Self::open(path)
        }
    }

    fn from_connection(path: PathBuf, conn: Connection, read_only: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                read_only,
                conn: Mutex::new(conn),
                last_timestamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
                feed: ChangeFeed::new(),
            }),
        }
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether the store was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Document counts and file size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let count = |collection: Collection| -> Result<i64> {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection.name()],
                |row| row.get(0),
            )?)
        };

        let db_size_bytes = if self.inner.path.as_os_str() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.inner.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            patients: count(Collection::Patients)?,
            goals: count(Collection::ProfessionalGoals)?,
            reflections: count(Collection::Reflections)?,
            schema_version: migrations::schema_version(&conn)?,
            db_size_bytes,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    /// Server timestamp, strictly increasing so creation order is total.
    fn next_timestamp(&self) -> Result<DateTime<Utc>> {
        let mut last = self
            .inner
            .last_timestamp
            .lock()
            .map_err(|_| Error::internal("timestamp lock poisoned"))?;
        let mut now = Utc::now().trunc_subsecs(6);
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        Ok(now)
    }

    fn list_documents(&self, collection: Collection, owner: &OwnerId) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, owner_id, created_at, body
            FROM documents WHERE collection = ?1 AND owner_id = ?2
            ORDER BY created_at DESC, id ASC
            ",
        )?;

        let rows = stmt
            .query_map(params![collection.name(), owner.as_str()], read_row)?
            .collect::<std::result::Result<Vec<Row>, _>>()?;

        rows.into_iter()
            .map(|row| row_to_document(collection, row))
            .collect()
    }

    fn deliver(&self, collection: Collection, owner: &OwnerId, on_change: &mut SnapshotCallback) {
        match self.list_documents(collection, owner) {
            Ok(snapshot) => on_change(snapshot),
            Err(err) => warn!(%collection, error = %err, "Failed to refresh subscription"),
        }
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn row_to_document(collection: Collection, (id, owner, created_at, body): Row) -> Result<Document> {
    let invalid = |message: String| Error::InvalidRecord {
        collection,
        id: id.clone(),
        message,
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|err| invalid(format!("bad createdAt `{created_at}`: {err}")))?
        .with_timezone(&Utc);
    let fields = match serde_json::from_str(&body) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(invalid("body is not a JSON object".into())),
        Err(err) => return Err(invalid(err.to_string())),
    };

    Ok(Document {
        id: RecordId::from(id),
        collection,
        owner_id: OwnerId::new(owner),
        created_at,
        fields,
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list(&self, collection: Collection, owner: &OwnerId) -> Result<Vec<Document>> {
        self.list_documents(collection, owner)
    }

    async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Document>> {
        let row = self
            .conn()?
            .query_row(
                r"
                SELECT id, owner_id, created_at, body
                FROM documents WHERE collection = ?1 AND id = ?2
                ",
                params![collection.name(), id.as_str()],
                read_row,
            )
            .optional()?;
        row.map(|row| row_to_document(collection, row)).transpose()
    }

    async fn create(
        &self,
        collection: Collection,
        owner: &OwnerId,
        fields: Map<String, Value>,
    ) -> Result<Document> {
        let fields = strip_reserved(fields);
        let id = RecordId::generate();
        let created_at = self.next_timestamp()?;
        let stamp = format_timestamp(created_at);
        let body = serde_json::to_string(&fields)?;

        self.conn()?.execute(
            r"
            INSERT INTO documents (id, collection, owner_id, created_at, updated_at, body)
            VALUES (?1, ?2, ?3, ?4, ?4, ?5)
            ",
            params![id.as_str(), collection.name(), owner.as_str(), stamp, body],
        )?;
        debug!(%collection, %id, "Created document");

        self.inner.feed.emit(ChangeEvent {
            collection,
            owner_id: owner.clone(),
            id: id.clone(),
            kind: ChangeKind::Created,
        });

        Ok(Document {
            id,
            collection,
            owner_id: owner.clone(),
            created_at,
            fields,
        })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> Result<()> {
        let patch = strip_reserved(patch);
        let owner = {
            let conn = self.conn()?;
            let existing: Option<(String, String)> = conn
                .query_row(
                    "SELECT owner_id, body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.name(), id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((owner, body)) = existing else {
                return Err(Error::not_found(collection, id.as_str()));
            };

            let mut fields = match serde_json::from_str(&body) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) => {
                    return Err(Error::InvalidRecord {
                        collection,
                        id: id.to_string(),
                        message: "body is not a JSON object".into(),
                    })
                }
                Err(err) => {
                    return Err(Error::InvalidRecord {
                        collection,
                        id: id.to_string(),
                        message: err.to_string(),
                    })
                }
            };
            fields.extend(patch);

            conn.execute(
                "UPDATE documents SET body = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    serde_json::to_string(&fields)?,
                    format_timestamp(Utc::now()),
                    id.as_str()
                ],
            )?;
            owner
        };
        debug!(%collection, %id, "Updated document");

        self.inner.feed.emit(ChangeEvent {
            collection,
            owner_id: OwnerId::new(owner),
            id: id.clone(),
            kind: ChangeKind::Updated,
        });
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()> {
        let owner = {
            let conn = self.conn()?;
            let owner: Option<String> = conn
                .query_row(
                    "SELECT owner_id FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.name(), id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(owner) = owner else {
                return Err(Error::not_found(collection, id.as_str()));
            };
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id.as_str()],
            )?;
            owner
        };
        debug!(%collection, %id, "Deleted document");

        self.inner.feed.emit(ChangeEvent {
            collection,
            owner_id: OwnerId::new(owner),
            id: id.clone(),
            kind: ChangeKind::Deleted,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        owner: &OwnerId,
        mut on_change: SnapshotCallback,
    ) -> Result<Subscription> {
        let mut receiver = self.inner.feed.subscribe();
        debug!(
            %collection,
            subscribers = self.inner.feed.subscriber_count(),
            "Subscribed to changes"
        );
        let store = self.clone();
        let owner = owner.clone();

        let task = tokio::spawn(async move {
            store.deliver(collection, &owner, &mut on_change);
            loop {
                match receiver.recv().await {
                    Ok(event) if event.concerns(collection, &owner) => {
                        store.deliver(collection, &owner, &mut on_change);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Subscription lagged, refreshing");
                        store.deliver(collection, &owner, &mut on_change);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration as TokioDuration};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<usize>) -> usize {
        timeout(TokioDuration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("closed")
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = store
            .create(
                Collection::Reflections,
                &owner("u1"),
                object(json!({"id": "forged", "ownerId": "u2", "learning": "x"})),
            )
            .await
            .unwrap();

        assert_ne!(doc.id.as_str(), "forged");
        assert_eq!(doc.owner_id, owner("u1"));
        assert!(!doc.fields.contains_key("ownerId"));
        assert_eq!(doc.fields["learning"], "x");

        let fetched = store
            .get(Collection::Reflections, &doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, doc);
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fields = || object(json!({"goal": "g", "status": "pending"}));
        store.create(Collection::ProfessionalGoals, &owner("u1"), fields()).await.unwrap();
        store.create(Collection::ProfessionalGoals, &owner("u2"), fields()).await.unwrap();
        store.create(Collection::Reflections, &owner("u1"), fields()).await.unwrap();

        let docs = store
            .list(Collection::ProfessionalGoals, &owner("u1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].owner_id, owner("u1"));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .create(Collection::Reflections, &owner("u1"), object(json!({"n": 1})))
            .await
            .unwrap();
        let second = store
            .create(Collection::Reflections, &owner("u1"), object(json!({"n": 2})))
            .await
            .unwrap();

        assert!(second.created_at > first.created_at);
        let docs = store.list(Collection::Reflections, &owner("u1")).await.unwrap();
        assert_eq!(docs[0].id, second.id);
        assert_eq!(docs[1].id, first.id);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = store
            .create(
                Collection::Patients,
                &owner("u1"),
                object(json!({"reason": "Dolor", "diagnosis": ""})),
            )
            .await
            .unwrap();

        store
            .update(
                Collection::Patients,
                &doc.id,
                object(json!({"diagnosis": "Gastritis", "ownerId": "u2"})),
            )
            .await
            .unwrap();

        let fetched = store.get(Collection::Patients, &doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.fields["reason"], "Dolor");
        assert_eq!(fetched.fields["diagnosis"], "Gastritis");
        assert_eq!(fetched.owner_id, owner("u1"));
        assert_eq!(fetched.created_at, doc.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .update(Collection::Patients, &RecordId::from("nope"), Map::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_second_delete_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let keep = store
            .create(Collection::Reflections, &owner("u1"), object(json!({"n": 1})))
            .await
            .unwrap();
        let doomed = store
            .create(Collection::Reflections, &owner("u1"), object(json!({"n": 2})))
            .await
            .unwrap();

        store.delete(Collection::Reflections, &doomed.id).await.unwrap();
        let err = store
            .delete(Collection::Reflections, &doomed.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let docs = store.list(Collection::Reflections, &owner("u1")).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_wrong_collection_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = store
            .create(Collection::Reflections, &owner("u1"), Map::new())
            .await
            .unwrap();
        let err = store.delete(Collection::Patients, &doc.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_snapshots() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = store
            .subscribe(
                Collection::ProfessionalGoals,
                &owner("u1"),
                Box::new(move |snapshot| {
                    let _ = tx.send(snapshot.len());
                }),
            )
            .await
            .unwrap();

        assert_eq!(next(&mut rx).await, 0);

        store
            .create(Collection::ProfessionalGoals, &owner("u1"), Map::new())
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, 1);

        // Other owners do not trigger a refresh.
        store
            .create(Collection::ProfessionalGoals, &owner("u2"), Map::new())
            .await
            .unwrap();
        store
            .create(Collection::ProfessionalGoals, &owner("u1"), Map::new())
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, 2);

        assert!(subscription.is_active());
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_file_store_persists_and_reports_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("journal.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .create(Collection::Patients, &owner("u1"), Map::new())
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.patients, 1);
        assert_eq!(stats.goals, 0);
        assert_eq!(stats.schema_version, migrations::CURRENT_VERSION);
        assert!(stats.db_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes_as_permission_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.db");
        drop(SqliteStore::open(&path).unwrap());

        let store = SqliteStore::open_read_only(&path).unwrap();
        assert!(store.is_read_only());
        assert!(store
            .list(Collection::Patients, &owner("u1"))
            .await
            .unwrap()
            .is_empty());

        let err = store
            .create(Collection::Patients, &owner("u1"), Map::new())
            .await
            .unwrap_err();
        assert!(err.is_permission_error(), "got {err:?}");
    }

    #[test]
    fn test_open_read_only_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = SqliteStore::open_read_only(dir.path().join("missing.db")).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Unavailable);
    }

    #[test]
    fn test_corrupt_body_is_invalid_record() {
        let row = (
            "x".to_string(),
            "u1".to_string(),
            "2024-01-01T00:00:00.000000Z".to_string(),
            "[1, 2]".to_string(),
        );
        let err = row_to_document(Collection::Patients, row).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_unreadable_body() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = store
            .create(Collection::Reflections, &owner("u1"), object(json!({"learning": "x"})))
            .await
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE documents SET body = 'not json' WHERE id = ?1",
                [doc.id.as_str()],
            )
            .unwrap();

        let err = store
            .update(Collection::Reflections, &doc.id, object(json!({"learning": "y"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));

        let body: String = store
            .conn()
            .unwrap()
            .query_row("SELECT body FROM documents WHERE id = ?1", [doc.id.as_str()], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(body, "not json");
    }

    #[tokio::test]
    async fn test_each_subscription_holds_a_receiver() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.inner.feed.subscriber_count(), 0);

        let first = store
            .subscribe(Collection::Patients, &owner("u1"), Box::new(|_| {}))
            .await
            .unwrap();
        let second = store
            .subscribe(Collection::Reflections, &owner("u1"), Box::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(store.inner.feed.subscriber_count(), 2);

        drop(first);
        drop(second);
    }
}
