//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for entities, key-values and links.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes enforce draft/patch validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidField`)
//!   in addition to DB transport errors.

use crate::db::DbError;
use crate::model::entity::{EntityKind, EntityRef, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_repo;
pub mod key_value_repo;
pub mod link_repo;

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared error for the entity/key-value/link store.
#[derive(Debug)]
pub enum StoreError {
    /// Draft or patch value failed validation.
    Validation(ValidationError),
    /// Patch targets a field outside the kind's whitelist.
    InvalidField {
        kind: EntityKind,
        field: &'static str,
    },
    /// Entity row does not exist.
    NotFound(EntityRef),
    /// Key-value row does not exist.
    KeyValueNotFound(i64),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidField { kind, field } => {
                write!(f, "field `{field}` cannot be patched on kind `{kind}`")
            }
            Self::NotFound(entity) => write!(f, "entity not found: {entity}"),
            Self::KeyValueNotFound(id) => write!(f, "key-value not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "store requires table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_store_connection_ready(
    conn: &rusqlite::Connection,
) -> StoreResult<()> {
    let expected_version = crate::db::migrations::latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for kind in EntityKind::ALL {
        if !table_exists(conn, kind.table())? {
            return Err(StoreError::MissingRequiredTable(kind.table()));
        }
    }
    for table in ["key_values", "links"] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &rusqlite::Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
