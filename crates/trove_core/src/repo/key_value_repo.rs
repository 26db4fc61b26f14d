//! Key-value repository: free-form attribute lists per entity.
//!
//! # Responsibility
//! - Provide add/update/delete/list APIs over the shared `key_values`
//!   table.
//!
//! # Invariants
//! - Keys are not deduplicated; callers may store several values under
//!   one key.
//! - Listing order is insertion order (auto-increment id).

use crate::model::entity::EntityRef;
use crate::repo::{ensure_store_connection_ready, StoreError, StoreResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// One stored key-value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub id: i64,
    pub key: String,
    pub value: String,
}

/// Repository interface for entity attribute pairs.
pub trait KeyValueRepository {
    /// Adds one pair to the addressed entity and returns its row id.
    fn add(&self, entity: EntityRef, key: &str, value: &str) -> StoreResult<i64>;
    /// Replaces key and value of one pair by row id.
    fn update(&self, kv_id: i64, key: &str, value: &str) -> StoreResult<()>;
    /// Deletes one pair by row id.
    fn delete(&self, kv_id: i64) -> StoreResult<()>;
    /// Lists all pairs of one entity in insertion order.
    fn list_for(&self, entity: EntityRef) -> StoreResult<Vec<KeyValue>>;
    /// Distinct keys across all entities, sorted.
    fn distinct_keys(&self) -> StoreResult<Vec<String>>;
}

/// SQLite-backed key-value repository.
pub struct SqliteKeyValueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKeyValueRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl KeyValueRepository for SqliteKeyValueRepository<'_> {
    fn add(&self, entity: EntityRef, key: &str, value: &str) -> StoreResult<i64> {
        add_key_value(self.conn, entity, key, value)
    }

    fn update(&self, kv_id: i64, key: &str, value: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE key_values SET key = ?1, value = ?2 WHERE id = ?3;",
            params![key, value, kv_id],
        )?;
        if changed == 0 {
            return Err(StoreError::KeyValueNotFound(kv_id));
        }
        Ok(())
    }

    fn delete(&self, kv_id: i64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM key_values WHERE id = ?1;", [kv_id])?;
        if changed == 0 {
            return Err(StoreError::KeyValueNotFound(kv_id));
        }
        Ok(())
    }

    fn list_for(&self, entity: EntityRef) -> StoreResult<Vec<KeyValue>> {
        list_key_values(self.conn, entity)
    }

    fn distinct_keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT key FROM key_values ORDER BY key;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

pub(crate) fn add_key_value(
    conn: &Connection,
    entity: EntityRef,
    key: &str,
    value: &str,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO key_values (entity_kind, entity_id, key, value)
         VALUES (?1, ?2, ?3, ?4);",
        params![entity.kind.as_str(), entity.id.to_string(), key, value],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_key_values(conn: &Connection, entity: EntityRef) -> StoreResult<Vec<KeyValue>> {
    let mut stmt = conn.prepare(
        "SELECT id, key, value
         FROM key_values
         WHERE entity_kind = ?1 AND entity_id = ?2
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query(params![entity.kind.as_str(), entity.id.to_string()])?;
    let mut pairs = Vec::new();
    while let Some(row) = rows.next()? {
        pairs.push(KeyValue {
            id: row.get("id")?,
            key: row.get("key")?,
            value: row.get("value")?,
        });
    }
    Ok(pairs)
}

pub(crate) fn delete_key_values_for(conn: &Connection, entity: EntityRef) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM key_values WHERE entity_kind = ?1 AND entity_id = ?2;",
        params![entity.kind.as_str(), entity.id.to_string()],
    )?;
    Ok(removed)
}
