//! SQLite-backed store for one collection.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use rostersync_core::storage::{Entity, Result, Store};

use super::conversions::{decode_entity, encode_key, encode_row};
use super::error::{map_tokio_rusqlite_error, wrap_err};
use super::schema::CollectionSql;

/// Store handle for one collection of a [`super::Database`].
///
/// `find_all` returns entities in insertion order; overwriting a key keeps its
/// position. Each operation is atomic, and `save_all` runs in one transaction.
#[derive(Clone)]
pub struct SqliteStore<T: Entity> {
    conn: Connection,
    collection: Arc<str>,
    sql: Arc<CollectionSql>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteStore<T> {
    pub(super) fn new(conn: Connection, collection: &str) -> Self {
        Self {
            conn,
            collection: Arc::from(collection),
            sql: Arc::new(CollectionSql::new(collection)),
            _entity: PhantomData,
        }
    }

    /// Name of the collection this handle reads and writes.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl<T: Entity> Store<T> for SqliteStore<T> {
    async fn count(&self) -> Result<usize> {
        let sql = Arc::clone(&self.sql);

        self.conn
            .call(move |conn| {
                conn.query_row(&sql.count, [], |row| row.get::<_, i64>(0))
                    .map_err(wrap_err)
            })
            .await
            .map(|n| n as usize)
            .map_err(map_tokio_rusqlite_error)
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        let sql = Arc::clone(&self.sql);

        let values = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql.select_all).map_err(wrap_err)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(wrap_err)?;

                let mut values = Vec::new();
                for row_result in rows {
                    values.push(row_result.map_err(wrap_err)?);
                }
                Ok(values)
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        values.iter().map(|value| decode_entity(value)).collect()
    }

    async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        let sql = Arc::clone(&self.sql);
        let key = encode_key::<T>(key)?;

        let value = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql.select_by_key).map_err(wrap_err)?;
                match stmt.query_row([&key], |row| row.get::<_, String>(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        value.as_deref().map(decode_entity).transpose()
    }

    async fn save(&self, entity: T) -> Result<T> {
        let sql = Arc::clone(&self.sql);
        let (key, value) = encode_row(&entity)?;

        self.conn
            .call(move |conn| {
                conn.execute(&sql.upsert, rusqlite::params![key, value])
                    .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        Ok(entity)
    }

    async fn save_all(&self, entities: Vec<T>) -> Result<Vec<T>> {
        let sql = Arc::clone(&self.sql);
        let rows = entities
            .iter()
            .map(encode_row)
            .collect::<Result<Vec<(String, String)>>>()?;
        let saved = rows.len();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                {
                    let mut stmt = tx.prepare_cached(&sql.upsert).map_err(wrap_err)?;
                    for (key, value) in &rows {
                        stmt.execute(rusqlite::params![key, value])
                            .map_err(wrap_err)?;
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        tracing::debug!(collection = %self.collection, saved, "Saved batch");
        Ok(entities)
    }

    async fn delete_by_key(&self, key: &T::Key) -> Result<()> {
        let sql = Arc::clone(&self.sql);
        let key = encode_key::<T>(key)?;

        self.conn
            .call(move |conn| {
                conn.execute(&sql.delete_by_key, [&key]).map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn delete_all(&self) -> Result<()> {
        let sql = Arc::clone(&self.sql);

        let deleted = self
            .conn
            .call(move |conn| conn.execute(&sql.delete_all, []).map_err(wrap_err))
            .await
            .map_err(map_tokio_rusqlite_error)?;

        tracing::debug!(collection = %self.collection, deleted, "Cleared collection");
        Ok(())
    }
}
