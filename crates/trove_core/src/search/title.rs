//! Case-insensitive title search across all entity kinds.
//!
//! # Responsibility
//! - Provide the quick-find lookup backing type-as-you-search UX.
//!
//! # Invariants
//! - Terms shorter than the minimum length return an empty result
//!   instead of scanning everything.
//! - Result ordering is deterministic: title, then kind, then id.

use crate::model::entity::{EntityId, EntityKind};
use crate::repo::{StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shortest term that triggers a scan.
pub const MIN_TERM_LEN: usize = 3;

const DEFAULT_LIMIT: u32 = 25;

/// Options for one title search.
#[derive(Debug, Clone)]
pub struct TitleQuery {
    pub term: String,
    pub limit: u32,
}

impl TitleQuery {
    /// Creates a query with the default result limit.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Single hit returned by [`search_titles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleHit {
    pub id: EntityId,
    pub kind: EntityKind,
    pub title: String,
}

/// Searches titles of every kind by case-insensitive substring.
pub fn search_titles(conn: &Connection, query: &TitleQuery) -> StoreResult<Vec<TitleHit>> {
    let term = query.term.trim();
    if term.chars().count() < MIN_TERM_LEN || query.limit == 0 {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(term));
    let mut stmt = conn.prepare(
        "SELECT id, kind, title
         FROM (
            SELECT id, 'place' AS kind, title FROM places WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'person', title FROM people WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'note', title FROM notes WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'image', title FROM images WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'file', title FROM files WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'todo', title FROM todos WHERE title LIKE ?1 ESCAPE '\\'
            UNION ALL SELECT id, 'custom_object', title FROM custom_objects
            WHERE title LIKE ?1 ESCAPE '\\'
         )
         ORDER BY title ASC, kind ASC, id ASC
         LIMIT ?2;",
    )?;

    let mut rows = stmt.query(params![pattern, i64::from(query.limit)])?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        hits.push(parse_hit_row(row)?);
    }
    Ok(hits)
}

/// Escapes LIKE wildcards so user input always matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_hit_row(row: &Row<'_>) -> StoreResult<TitleHit> {
    let kind_text: String = row.get("kind")?;
    let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid kind `{kind_text}` in title search"))
    })?;
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid `{id_text}` in title search"))
    })?;
    Ok(TitleHit {
        id,
        kind,
        title: row.get("title")?,
    })
}
