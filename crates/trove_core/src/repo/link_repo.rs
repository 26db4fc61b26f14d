//! Link repository: undirected adjacency over entity references.
//!
//! # Responsibility
//! - Persist edges with canonical endpoint order.
//! - Provide neighbor and bounded breadth-first expansion queries.
//!
//! # Invariants
//! - At most one row exists per unordered entity pair; `add_edge` is
//!   idempotent in either direction.
//! - Self-edges are never stored.
//! - Query results are deterministic (sorted by `EntityRef` order).

use crate::model::entity::{EntityKind, EntityRef};
use crate::repo::{ensure_store_connection_ready, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Default hop bound for the related-items expansion.
pub const DEFAULT_EXPANSION_DEPTH: u32 = 2;

/// Repository interface for undirected entity links.
pub trait LinkRepository {
    /// Inserts the undirected edge between `a` and `b`.
    fn add_edge(&self, a: EntityRef, b: EntityRef) -> StoreResult<bool>;
    /// Removes the edge between `a` and `b`, whichever way it was added.
    fn remove_edge(&self, a: EntityRef, b: EntityRef) -> StoreResult<bool>;
    /// All entities with a direct edge to `entity`, sorted.
    fn neighbors(&self, entity: EntityRef) -> StoreResult<Vec<EntityRef>>;
    /// Breadth-first union of neighbors at hops `1..=depth`.
    fn expand(&self, entity: EntityRef, depth: u32) -> StoreResult<Vec<EntityRef>>;
    /// Removes every edge touching `entity`. Returns the removed count.
    fn remove_all_for(&self, entity: EntityRef) -> StoreResult<usize>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    /// No-op for self-edges and for pairs already linked in either
    /// direction. Returns whether a new row was inserted.
    fn add_edge(&self, a: EntityRef, b: EntityRef) -> StoreResult<bool> {
        add_edge(self.conn, a, b)
    }

    fn remove_edge(&self, a: EntityRef, b: EntityRef) -> StoreResult<bool> {
        let (lo, hi) = canonical_pair(a, b);
        let removed = self.conn.execute(
            "DELETE FROM links
             WHERE a_kind = ?1 AND a_id = ?2 AND b_kind = ?3 AND b_id = ?4;",
            params![
                lo.kind.as_str(),
                lo.id.to_string(),
                hi.kind.as_str(),
                hi.id.to_string(),
            ],
        )?;
        Ok(removed > 0)
    }

    fn neighbors(&self, entity: EntityRef) -> StoreResult<Vec<EntityRef>> {
        Ok(neighbor_set(self.conn, entity)?.into_iter().collect())
    }

    /// The origin is excluded; entities reachable over several paths
    /// appear once. The result is flattened: hop distance is not
    /// recoverable from it.
    fn expand(&self, entity: EntityRef, depth: u32) -> StoreResult<Vec<EntityRef>> {
        let mut reached: BTreeSet<EntityRef> = BTreeSet::new();
        let mut frontier: Vec<EntityRef> = vec![entity];

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in frontier {
                for neighbor in neighbor_set(self.conn, current)? {
                    if neighbor == entity || reached.contains(&neighbor) {
                        continue;
                    }
                    reached.insert(neighbor);
                    next.push(neighbor);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(reached.into_iter().collect())
    }

    fn remove_all_for(&self, entity: EntityRef) -> StoreResult<usize> {
        remove_all_edges_for(self.conn, entity)
    }
}

/// Canonical storage order for an unordered endpoint pair.
pub(crate) fn canonical_pair(a: EntityRef, b: EntityRef) -> (EntityRef, EntityRef) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn add_edge(conn: &Connection, a: EntityRef, b: EntityRef) -> StoreResult<bool> {
    if a == b {
        return Ok(false);
    }
    let (lo, hi) = canonical_pair(a, b);
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO links (a_kind, a_id, b_kind, b_id)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            lo.kind.as_str(),
            lo.id.to_string(),
            hi.kind.as_str(),
            hi.id.to_string(),
        ],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn remove_all_edges_for(conn: &Connection, entity: EntityRef) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM links
         WHERE (a_kind = ?1 AND a_id = ?2) OR (b_kind = ?1 AND b_id = ?2);",
        params![entity.kind.as_str(), entity.id.to_string()],
    )?;
    Ok(removed)
}

fn neighbor_set(conn: &Connection, entity: EntityRef) -> StoreResult<BTreeSet<EntityRef>> {
    let mut stmt = conn.prepare(
        "SELECT b_kind AS kind, b_id AS id
         FROM links
         WHERE a_kind = ?1 AND a_id = ?2
         UNION
         SELECT a_kind AS kind, a_id AS id
         FROM links
         WHERE b_kind = ?1 AND b_id = ?2;",
    )?;
    let mut rows = stmt.query(params![entity.kind.as_str(), entity.id.to_string()])?;
    let mut neighbors = BTreeSet::new();
    while let Some(row) = rows.next()? {
        neighbors.insert(parse_ref_row(row)?);
    }
    Ok(neighbors)
}

fn parse_ref_row(row: &Row<'_>) -> StoreResult<EntityRef> {
    let kind_text: String = row.get("kind")?;
    let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid kind `{kind_text}` in links endpoint"))
    })?;
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid `{id_text}` in links endpoint"))
    })?;
    Ok(EntityRef::new(kind, id))
}
