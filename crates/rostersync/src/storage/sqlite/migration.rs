//! Schema migration steps run when a database is opened at a newer version.

use super::schema;

/// The version change being applied.
#[derive(Debug, Clone, Copy)]
pub struct Upgrade<'a> {
    /// Version found on disk (0 for a fresh database).
    pub from: u32,
    /// Version being opened.
    pub to: u32,
    /// Tables present before the migration.
    pub existing: &'a [String],
    /// Collections the new version declares.
    pub declared: &'a [String],
}

/// A migration step run inside the upgrade transaction.
///
/// After it returns, the on-disk tables must match `upgrade.declared` exactly
/// or opening fails with `StoreError::SchemaMismatch`.
pub trait Migration: Send + Sync {
    fn migrate(&self, tx: &rusqlite::Transaction<'_>, upgrade: &Upgrade<'_>) -> rusqlite::Result<()>;
}

/// Drops every existing collection, then creates the declared ones.
///
/// All cached data is lost on every version bump, including collections whose
/// definition did not change.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropAndRecreate;

impl Migration for DropAndRecreate {
    fn migrate(&self, tx: &rusqlite::Transaction<'_>, upgrade: &Upgrade<'_>) -> rusqlite::Result<()> {
        for table in upgrade.existing {
            tx.execute_batch(&schema::drop_collection(table))?;
        }
        for collection in upgrade.declared {
            tx.execute_batch(&schema::create_collection(collection))?;
        }
        tracing::debug!(
            from = upgrade.from,
            to = upgrade.to,
            dropped = upgrade.existing.len(),
            created = upgrade.declared.len(),
            "Recreated all collections"
        );
        Ok(())
    }
}
