//! Database connection, schema versioning and recovery.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_rusqlite::Connection;

use rostersync_core::storage::{Entity, Result, StoreError};

use super::error::{map_open_error, map_tokio_rusqlite_error, wrap_err};
use super::migration::{DropAndRecreate, Migration, Upgrade};
use super::schema;
use super::store::SqliteStore;

/// Number of open attempts before a database is reported unavailable.
///
/// A failed first attempt deletes the database file before the second one.
pub const MAX_OPEN_ATTEMPTS: u32 = 2;

const FILE_EXTENSION: &str = "sqlite3";

/// Name, version and collection set of a database.
///
/// The version must be bumped whenever the collection set changes.
#[derive(Clone)]
pub struct DatabaseSchema {
    name: String,
    version: u32,
    collections: Vec<String>,
    migration: Arc<dyn Migration>,
}

impl fmt::Debug for DatabaseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSchema")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

impl DatabaseSchema {
    /// Creates a schema with no collections and the [`DropAndRecreate`] migration.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            collections: Vec::new(),
            migration: Arc::new(DropAndRecreate),
        }
    }

    /// Declares a collection.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Declares several collections.
    pub fn with_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replaces the migration run on version upgrades.
    pub fn with_migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migration = Arc::new(migration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    fn declares(&self, collection: &str) -> bool {
        self.collections.iter().any(|c| c == collection)
    }

    fn validate(&self) -> Result<()> {
        if !is_valid_database_name(&self.name) {
            return Err(StoreError::InvalidSchema(format!(
                "invalid database name: {:?}",
                self.name
            )));
        }
        if self.version == 0 {
            return Err(StoreError::InvalidSchema(
                "version must be at least 1".to_string(),
            ));
        }
        // SQLite table names are case-insensitive.
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !schema::is_valid_collection_name(collection) {
                return Err(StoreError::InvalidSchema(format!(
                    "invalid collection name: {collection:?}"
                )));
            }
            if !seen.insert(collection.to_ascii_lowercase()) {
                return Err(StoreError::InvalidSchema(format!(
                    "duplicate collection: {collection}"
                )));
            }
        }
        Ok(())
    }
}

fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Returns the file backing database `name` under `root`.
pub fn database_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{name}.{FILE_EXTENSION}"))
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Deletes database `name` under `root`, including its journal files.
///
/// Missing files are not an error.
pub async fn delete_database(root: impl AsRef<Path>, name: &str) -> Result<()> {
    let path = database_path(root.as_ref(), name);
    let candidates = [
        sidecar(&path, "-wal"),
        sidecar(&path, "-shm"),
        sidecar(&path, "-journal"),
        path.clone(),
    ];

    for candidate in &candidates {
        match tokio::fs::remove_file(candidate).await {
            Ok(()) => tracing::debug!(file = %candidate.display(), "Removed database file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(StoreError::ConnectionFailed(format!(
                    "Failed to delete {}: {err}",
                    candidate.display()
                )))
            }
        }
    }

    tracing::info!(database = %name, path = %path.display(), "Database deleted");
    Ok(())
}

/// An open database shared by every collection it declares.
///
/// Cloning [`SqliteStore`] handles is cheap; they all use this connection.
pub struct Database {
    conn: Connection,
    root: Option<PathBuf>,
    schema: DatabaseSchema,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.root)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (creating or upgrading as needed) database `schema.name()` under `root`.
    ///
    /// `root` must already exist. If opening fails with a recoverable error,
    /// including a file left behind by a newer schema version, the database is
    /// deleted and opened again; after [`MAX_OPEN_ATTEMPTS`] failures the error
    /// is [`StoreError::Unavailable`]. Schema mismatches are returned as-is
    /// without touching the file.
    pub async fn open(root: impl AsRef<Path>, schema: DatabaseSchema) -> Result<Self> {
        schema.validate()?;
        let root = root.as_ref().to_path_buf();
        let path = database_path(&root, &schema.name);

        let mut attempt = 1;
        loop {
            match Self::try_open(&path, &schema).await {
                Ok(conn) => {
                    tracing::info!(
                        database = %schema.name,
                        version = schema.version,
                        attempt,
                        "Database opened"
                    );
                    return Ok(Self {
                        conn,
                        root: Some(root),
                        schema,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    if attempt >= MAX_OPEN_ATTEMPTS {
                        tracing::error!(
                            database = %schema.name,
                            attempts = attempt,
                            error = %err,
                            "Database unavailable"
                        );
                        return Err(StoreError::Unavailable {
                            attempts: attempt,
                            reason: err.to_string(),
                        });
                    }

                    tracing::warn!(
                        database = %schema.name,
                        attempt,
                        error = %err,
                        "Failed to open database, deleting it and retrying"
                    );
                    if let Err(delete_err) = delete_database(&root, &schema.name).await {
                        tracing::warn!(
                            database = %schema.name,
                            error = %delete_err,
                            "Failed to delete database before retry"
                        );
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Opens a private in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    /// There is nothing to delete, so failures are returned without retry.
    pub async fn open_in_memory(schema: DatabaseSchema) -> Result<Self> {
        schema.validate()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(map_open_error)?;
        Self::prepare(&conn, &schema).await?;

        Ok(Self {
            conn,
            root: None,
            schema,
        })
    }

    async fn try_open(path: &Path, schema: &DatabaseSchema) -> Result<Connection> {
        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(map_open_error)?;

        if let Err(err) = Self::prepare(&conn, schema).await {
            if let Err(close_err) = conn.close().await {
                tracing::debug!(error = %close_err, "Failed to close rejected connection");
            }
            return Err(err);
        }

        Ok(conn)
    }

    /// Brings the schema to the requested version and verifies the table set.
    async fn prepare(conn: &Connection, schema: &DatabaseSchema) -> Result<()> {
        let requested = schema.version;
        let declared = schema.collections.clone();
        let migration = Arc::clone(&schema.migration);

        conn.call(move |conn| Ok(prepare_schema(conn, requested, &declared, migration.as_ref())))
            .await
            .map_err(map_open_error)?
    }

    /// Returns a store for a declared collection.
    pub fn collection<T: Entity>(&self, name: &str) -> Result<SqliteStore<T>> {
        if !self.schema.declares(name) {
            return Err(StoreError::UnknownCollection(name.to_string()));
        }
        Ok(SqliteStore::new(self.conn.clone(), name))
    }

    /// Returns the store for `T`'s default collection.
    pub fn collection_for<T: Entity>(&self) -> Result<SqliteStore<T>> {
        self.collection(T::COLLECTION)
    }

    /// Returns the names of the tables physically present, sorted.
    pub async fn stored_collections(&self) -> Result<Vec<String>> {
        self.conn
            .call(|conn| read_tables(conn).map_err(wrap_err))
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    /// Returns the number of rows in a declared collection.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        if !self.schema.declares(collection) {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }
        let sql = schema::CollectionSql::new(collection).count;

        self.conn
            .call(move |conn| {
                conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
                    .map_err(wrap_err)
            })
            .await
            .map(|n| n as usize)
            .map_err(map_tokio_rusqlite_error)
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn version(&self) -> u32 {
        self.schema.version
    }

    /// Returns the database file, or `None` for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        self.root
            .as_deref()
            .map(|root| database_path(root, &self.schema.name))
    }

    /// Closes the connection. Outstanding store handles start failing.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(map_tokio_rusqlite_error)
    }

    /// Closes the connection and deletes the database files.
    pub async fn delete(self) -> Result<()> {
        let root = self.root.clone();
        let name = self.schema.name.clone();
        self.close().await?;
        match root {
            Some(root) => delete_database(root, &name).await,
            None => Ok(()),
        }
    }
}

fn connection_failed(err: rusqlite::Error) -> StoreError {
    StoreError::ConnectionFailed(err.to_string())
}

fn read_user_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(schema::SELECT_USER_VERSION, [], |row| row.get(0))
}

fn read_tables(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(schema::SELECT_TABLES)?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut tables = Vec::new();
    for row_result in rows {
        tables.push(row_result?);
    }
    tables.sort();
    Ok(tables)
}

fn prepare_schema(
    conn: &mut rusqlite::Connection,
    requested: u32,
    declared: &[String],
    migration: &dyn Migration,
) -> Result<()> {
    let current = read_user_version(conn).map_err(connection_failed)?;

    if current > requested {
        return Err(StoreError::VersionDowngrade { requested, current });
    }

    if current < requested {
        let existing = read_tables(conn).map_err(connection_failed)?;
        let tx = conn.transaction().map_err(connection_failed)?;
        migration
            .migrate(
                &tx,
                &Upgrade {
                    from: current,
                    to: requested,
                    existing: &existing,
                    declared,
                },
            )
            .map_err(connection_failed)?;
        // Dropping `tx` on mismatch rolls back, leaving the old version in place.
        verify_tables(&tx, declared)?;
        tx.pragma_update(None, "user_version", requested)
            .map_err(connection_failed)?;
        tx.commit().map_err(connection_failed)?;

        tracing::debug!(from = current, to = requested, "Database schema upgraded");
        return Ok(());
    }

    verify_tables(conn, declared)
}

/// Fails with `SchemaMismatch` unless the tables on disk are exactly `declared`.
fn verify_tables(conn: &rusqlite::Connection, declared: &[String]) -> Result<()> {
    let found = read_tables(conn).map_err(connection_failed)?;
    let mut expected = declared.to_vec();
    expected.sort();
    if found != expected {
        return Err(StoreError::SchemaMismatch {
            declared: expected,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rostersync_core::roster::{Event, User};
    use rostersync_core::storage::Store;

    fn schema_v1() -> DatabaseSchema {
        DatabaseSchema::new("roster", 1).with_collections(["events", "users"])
    }

    fn event(key: i64) -> Event {
        Event::new(key, format!("Event {key}"), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    #[tokio::test]
    async fn test_open_fresh_database_creates_declared_collections() {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();

        assert_eq!(db.version(), 1);
        assert_eq!(db.stored_collections().await.unwrap(), vec!["events", "users"]);
        assert_eq!(db.path(), Some(dir.path().join("roster.sqlite3")));
        assert!(dir.path().join("roster.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_data_survives_reopen_at_same_version() {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();
        let events = db.collection_for::<Event>().unwrap();
        events.save(event(1)).await.unwrap();
        db.close().await.unwrap();

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();
        let events = db.collection_for::<Event>().unwrap();
        assert_eq!(events.find_by_key(&1).await.unwrap(), Some(event(1)));
    }

    #[tokio::test]
    async fn test_version_bump_drops_every_collection() {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();
        db.collection_for::<Event>()
            .unwrap()
            .save_all(vec![event(1), event(2)])
            .await
            .unwrap();
        db.collection_for::<User>()
            .unwrap()
            .save(User::new("Ana", "ana@example.com"))
            .await
            .unwrap();
        db.close().await.unwrap();

        let v2 = DatabaseSchema::new("roster", 2).with_collections(["events", "positions"]);
        let db = Database::open(dir.path(), v2).await.unwrap();

        assert_eq!(
            db.stored_collections().await.unwrap(),
            vec!["events", "positions"]
        );
        assert_eq!(db.count("events").await.unwrap(), 0);
        assert_eq!(db.count("positions").await.unwrap(), 0);
        assert_eq!(
            db.collection_for::<User>().err(),
            Some(StoreError::UnknownCollection("users".to_string()))
        );
    }

    #[tokio::test]
    async fn test_changed_collections_without_version_bump_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        Database::open(dir.path(), DatabaseSchema::new("roster", 1).with_collection("events"))
            .await
            .unwrap()
            .close()
            .await
            .unwrap();

        let result = Database::open(dir.path(), schema_v1()).await;

        assert_eq!(
            result.err(),
            Some(StoreError::SchemaMismatch {
                declared: vec!["events".to_string(), "users".to_string()],
                found: vec!["events".to_string()],
            })
        );
        // Not treated as corruption: the file is still there.
        assert!(dir.path().join("roster.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_opening_older_version_recreates_database() {
        let dir = tempfile::tempdir().unwrap();
        let v2 = DatabaseSchema::new("roster", 2).with_collections(["events", "positions"]);
        let db = Database::open(dir.path(), v2).await.unwrap();
        db.collection_for::<Event>()
            .unwrap()
            .save(event(5))
            .await
            .unwrap();
        db.close().await.unwrap();

        let v1 = DatabaseSchema::new("roster", 1).with_collection("events");
        let db = Database::open(dir.path(), v1.clone()).await.unwrap();

        assert_eq!(db.version(), 1);
        assert_eq!(db.stored_collections().await.unwrap(), vec!["events"]);
        assert_eq!(db.count("events").await.unwrap(), 0);
        db.close().await.unwrap();

        // The recreated file opens at the old version without another reset.
        let db = Database::open(dir.path(), v1).await.unwrap();
        assert_eq!(db.stored_collections().await.unwrap(), vec!["events"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_deleted_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roster.sqlite3"), vec![0x42u8; 4096]).unwrap();

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();

        assert_eq!(db.stored_collections().await.unwrap(), vec!["events", "users"]);
        assert_eq!(db.count("events").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_consecutive_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing_root = dir.path().join("does").join("not").join("exist");

        let result = Database::open(&missing_root, schema_v1()).await;

        match result {
            Err(StoreError::Unavailable { attempts, .. }) => {
                assert_eq!(attempts, MAX_OPEN_ATTEMPTS)
            }
            other => panic!("Expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_schemas_are_rejected_before_opening() {
        let dir = tempfile::tempdir().unwrap();

        let zero = DatabaseSchema::new("roster", 0).with_collection("events");
        assert!(matches!(
            Database::open(dir.path(), zero).await,
            Err(StoreError::InvalidSchema(_))
        ));

        let bad_name = DatabaseSchema::new("roster", 1).with_collection("user roles");
        assert!(matches!(
            Database::open(dir.path(), bad_name).await,
            Err(StoreError::InvalidSchema(_))
        ));

        let duplicate = DatabaseSchema::new("roster", 1).with_collections(["events", "events"]);
        assert!(matches!(
            Database::open(dir.path(), duplicate).await,
            Err(StoreError::InvalidSchema(_))
        ));

        let same_table = DatabaseSchema::new("roster", 1).with_collections(["Events", "events"]);
        assert!(matches!(
            Database::open(dir.path(), same_table).await,
            Err(StoreError::InvalidSchema(_))
        ));

        let bad_db = DatabaseSchema::new("../roster", 1).with_collection("events");
        assert!(matches!(
            Database::open(dir.path(), bad_db).await,
            Err(StoreError::InvalidSchema(_))
        ));

        assert!(!dir.path().join("roster.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_unknown_collection_is_rejected() {
        let db = Database::open_in_memory(schema_v1()).await.unwrap();

        assert_eq!(
            db.collection::<Event>("badges").err(),
            Some(StoreError::UnknownCollection("badges".to_string()))
        );
        assert!(matches!(
            db.count("badges").await,
            Err(StoreError::UnknownCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), schema_v1()).await.unwrap();

        db.delete().await.unwrap();

        assert!(!dir.path().join("roster.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_database_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        delete_database(dir.path(), "never-created").await.unwrap();
    }

    /// Keeps tables that are still declared and only adds or drops the difference.
    struct KeepUnchanged;

    impl Migration for KeepUnchanged {
        fn migrate(
            &self,
            tx: &rusqlite::Transaction<'_>,
            upgrade: &Upgrade<'_>,
        ) -> rusqlite::Result<()> {
            for table in upgrade.existing {
                if !upgrade.declared.contains(table) {
                    tx.execute_batch(&schema::drop_collection(table))?;
                }
            }
            for collection in upgrade.declared {
                tx.execute_batch(&schema::create_collection(collection))?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_custom_migration_can_preserve_collections() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), schema_v1()).await.unwrap();
        db.collection_for::<Event>()
            .unwrap()
            .save(event(3))
            .await
            .unwrap();
        db.close().await.unwrap();

        let v2 = DatabaseSchema::new("roster", 2)
            .with_collections(["events", "positions"])
            .with_migration(KeepUnchanged);
        let db = Database::open(dir.path(), v2).await.unwrap();

        assert_eq!(db.count("events").await.unwrap(), 1);
        assert_eq!(
            db.stored_collections().await.unwrap(),
            vec!["events", "positions"]
        );
    }

    /// Forgets to create anything.
    struct Forgetful;

    impl Migration for Forgetful {
        fn migrate(&self, _tx: &rusqlite::Transaction<'_>, _upgrade: &Upgrade<'_>) -> rusqlite::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_migration_leaving_wrong_tables_is_mismatch() {
        let schema = schema_v1().with_migration(Forgetful);

        let result = Database::open_in_memory(schema).await;

        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_failed_migration_does_not_stamp_version() {
        let dir = tempfile::tempdir().unwrap();

        let result = Database::open(dir.path(), schema_v1().with_migration(Forgetful)).await;
        assert_eq!(
            result.err(),
            Some(StoreError::SchemaMismatch {
                declared: vec!["events".to_string(), "users".to_string()],
                found: vec![],
            })
        );

        let db = Database::open(dir.path(), schema_v1()).await.unwrap();
        assert_eq!(db.stored_collections().await.unwrap(), vec!["events", "users"]);
    }
}
