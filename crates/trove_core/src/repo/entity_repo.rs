//! Entity repository: typed CRUD over the per-kind tables.
//!
//! # Responsibility
//! - Provide stable create/get/list/patch/delete APIs for every kind.
//! - Keep per-kind SQL and ordering policy inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate drafts/patches before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - List ordering is deterministic (id tiebreak after the policy order).

use crate::model::entity::{
    normalize_object_type, Entity, EntityDraft, EntityId, EntityKind, EntityRef, EntitySummary,
    FieldPatch, KindFields, TodoStatus, ValidationError,
};
use crate::repo::{ensure_store_connection_ready, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

/// Query options for per-kind listing.
#[derive(Debug, Clone, Default)]
pub struct EntityListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
    /// Kind-specific filter: custom-object `object_type` set membership.
    /// Ignored for every other kind.
    pub object_types: Vec<String>,
}

/// Repository interface for typed entity CRUD.
pub trait EntityRepository {
    /// Creates one entity and returns the persisted row.
    fn create(&self, draft: &EntityDraft) -> StoreResult<Entity>;
    /// Gets one entity by (kind, id).
    fn get(&self, entity: EntityRef) -> StoreResult<Option<Entity>>;
    /// Whether the addressed row exists.
    fn exists(&self, entity: EntityRef) -> StoreResult<bool>;
    /// Lists entities of one kind with the kind's ordering policy.
    fn list(&self, kind: EntityKind, query: &EntityListQuery) -> StoreResult<Vec<Entity>>;
    /// Cross-kind recency listing with incomplete todos pinned first.
    fn list_recent(&self, limit: u32, offset: u32) -> StoreResult<Vec<EntitySummary>>;
    /// Applies one whitelisted field patch.
    fn update_field(&self, entity: EntityRef, patch: &FieldPatch) -> StoreResult<()>;
    /// Deletes the entity row only (no cascade).
    fn delete_row(&self, entity: EntityRef) -> StoreResult<()>;
    /// Total row count across every kind.
    fn count_all(&self) -> StoreResult<u64>;
    /// Distinct custom-object type slugs, sorted.
    fn distinct_custom_object_types(&self) -> StoreResult<Vec<String>>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    /// Creates one entity and returns the persisted row (with the
    /// store-assigned creation timestamp).
    fn create(&self, draft: &EntityDraft) -> StoreResult<Entity> {
        draft.validate()?;
        let id = Uuid::new_v4();
        insert_entity(self.conn, id, draft)?;
        load_required(self.conn, EntityRef::new(draft.kind(), id))
    }

    fn get(&self, entity: EntityRef) -> StoreResult<Option<Entity>> {
        let sql = format!(
            "{} WHERE id = ?1;",
            select_sql(entity.kind)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([entity.id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(entity.kind, row)?));
        }
        Ok(None)
    }

    fn exists(&self, entity: EntityRef) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
            entity.kind.table()
        );
        let exists: i64 = self
            .conn
            .query_row(&sql, [entity.id.to_string()], |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn list(&self, kind: EntityKind, query: &EntityListQuery) -> StoreResult<Vec<Entity>> {
        let mut sql = select_sql(kind);
        let mut bind_values: Vec<Value> = Vec::new();

        if kind == EntityKind::CustomObject && !query.object_types.is_empty() {
            let placeholders = vec!["?"; query.object_types.len()].join(", ");
            sql.push_str(&format!(" WHERE object_type IN ({placeholders})"));
            for object_type in &query.object_types {
                bind_values.push(Value::Text(object_type.clone()));
            }
        }

        sql.push_str(order_clause(kind));

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
        sql.push(';');

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(kind, row)?);
        }
        Ok(entities)
    }

    /// Incomplete todos are always pinned first (oldest first) regardless
    /// of age; everything else follows newest first.
    fn list_recent(&self, limit: u32, offset: u32) -> StoreResult<Vec<EntitySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, title, created_at, object_type, storage_path, status
             FROM (
                SELECT id, 'place' AS kind, title, created_at,
                       NULL AS object_type, NULL AS storage_path, NULL AS status
                FROM places
                UNION ALL SELECT id, 'person', title, created_at, NULL, NULL, NULL FROM people
                UNION ALL SELECT id, 'note', title, created_at, NULL, NULL, NULL FROM notes
                UNION ALL SELECT id, 'image', title, created_at, NULL, storage_path, NULL FROM images
                UNION ALL SELECT id, 'file', title, created_at, NULL, storage_path, NULL FROM files
                UNION ALL SELECT id, 'todo', title, created_at, NULL, NULL, status FROM todos
                UNION ALL SELECT id, 'custom_object', title, created_at, object_type, NULL, NULL
                FROM custom_objects
             )
             ORDER BY
                CASE WHEN kind = 'todo' AND status = 0 THEN 0 ELSE 1 END ASC,
                CASE WHEN kind = 'todo' AND status = 0 THEN created_at END ASC,
                CASE WHEN kind != 'todo' OR status = 1 THEN created_at END DESC,
                id ASC
             LIMIT ?1 OFFSET ?2;",
        )?;

        let mut rows = stmt.query(params![i64::from(limit), i64::from(offset)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_summary_row(row)?);
        }
        Ok(items)
    }

    fn update_field(&self, entity: EntityRef, patch: &FieldPatch) -> StoreResult<()> {
        let changed = match patch {
            FieldPatch::Title(value) => {
                if value.trim().is_empty() {
                    return Err(ValidationError::EmptyTitle.into());
                }
                self.conn.execute(
                    &format!("UPDATE {} SET title = ?1 WHERE id = ?2;", entity.kind.table()),
                    params![value, entity.id.to_string()],
                )?
            }
            FieldPatch::Status(status) => {
                if entity.kind != EntityKind::Todo {
                    return Err(StoreError::InvalidField {
                        kind: entity.kind,
                        field: patch.field_name(),
                    });
                }
                self.conn.execute(
                    "UPDATE todos SET status = ?1 WHERE id = ?2;",
                    params![status.to_db(), entity.id.to_string()],
                )?
            }
            FieldPatch::Content(value) => {
                if entity.kind != EntityKind::Note {
                    return Err(StoreError::InvalidField {
                        kind: entity.kind,
                        field: patch.field_name(),
                    });
                }
                self.conn.execute(
                    "UPDATE notes SET content = ?1 WHERE id = ?2;",
                    params![value, entity.id.to_string()],
                )?
            }
        };

        if changed == 0 {
            return Err(StoreError::NotFound(entity));
        }
        Ok(())
    }

    /// Cascading of key-values, links and managed files is the
    /// orchestration layer's responsibility.
    fn delete_row(&self, entity: EntityRef) -> StoreResult<()> {
        delete_entity_row(self.conn, entity)
    }

    fn count_all(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT
                (SELECT COUNT(id) FROM places) +
                (SELECT COUNT(id) FROM people) +
                (SELECT COUNT(id) FROM notes) +
                (SELECT COUNT(id) FROM images) +
                (SELECT COUNT(id) FROM files) +
                (SELECT COUNT(id) FROM todos) +
                (SELECT COUNT(id) FROM custom_objects);",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn distinct_custom_object_types(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT object_type FROM custom_objects ORDER BY object_type;")?;
        let mut rows = stmt.query([])?;
        let mut types = Vec::new();
        while let Some(row) = rows.next()? {
            types.push(row.get(0)?);
        }
        Ok(types)
    }
}

pub(crate) fn insert_entity(conn: &Connection, id: EntityId, draft: &EntityDraft) -> StoreResult<()> {
    let id_text = id.to_string();
    match draft {
        EntityDraft::Place { title, lat, lng } => {
            conn.execute(
                "INSERT INTO places (id, title, lat, lng) VALUES (?1, ?2, ?3, ?4);",
                params![id_text, title, lat, lng],
            )?;
        }
        EntityDraft::Person { title } => {
            conn.execute(
                "INSERT INTO people (id, title) VALUES (?1, ?2);",
                params![id_text, title],
            )?;
        }
        EntityDraft::Note { title, content } => {
            conn.execute(
                "INSERT INTO notes (id, title, content) VALUES (?1, ?2, ?3);",
                params![id_text, title, content],
            )?;
        }
        EntityDraft::Image { title, storage_path } => {
            conn.execute(
                "INSERT INTO images (id, title, storage_path) VALUES (?1, ?2, ?3);",
                params![id_text, title, storage_path],
            )?;
        }
        EntityDraft::File { title, storage_path } => {
            conn.execute(
                "INSERT INTO files (id, title, storage_path) VALUES (?1, ?2, ?3);",
                params![id_text, title, storage_path],
            )?;
        }
        EntityDraft::Todo { title } => {
            conn.execute(
                "INSERT INTO todos (id, title, status) VALUES (?1, ?2, 0);",
                params![id_text, title],
            )?;
        }
        EntityDraft::CustomObject {
            title,
            object_type,
            mood,
        } => {
            let slug = normalize_object_type(object_type)
                .ok_or(StoreError::Validation(ValidationError::EmptyObjectType))?;
            conn.execute(
                "INSERT INTO custom_objects (id, title, object_type, mood)
                 VALUES (?1, ?2, ?3, ?4);",
                params![id_text, title, slug, mood],
            )?;
        }
    }
    Ok(())
}

pub(crate) fn delete_entity_row(conn: &Connection, entity: EntityRef) -> StoreResult<()> {
    let changed = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1;", entity.kind.table()),
        [entity.id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(entity));
    }
    Ok(())
}

pub(crate) fn load_required(conn: &Connection, entity: EntityRef) -> StoreResult<Entity> {
    let sql = format!("{} WHERE id = ?1;", select_sql(entity.kind));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([entity.id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_entity_row(entity.kind, row);
    }
    Err(StoreError::NotFound(entity))
}

fn select_sql(kind: EntityKind) -> String {
    let extra = match kind {
        EntityKind::Place => ", lat, lng",
        EntityKind::Person => "",
        EntityKind::Note => ", content",
        EntityKind::Image | EntityKind::File => ", storage_path",
        EntityKind::Todo => ", status",
        EntityKind::CustomObject => ", object_type, mood",
    };
    format!(
        "SELECT id, title, created_at{extra} FROM {}",
        kind.table()
    )
}

fn order_clause(kind: EntityKind) -> &'static str {
    match kind {
        // Incomplete first and oldest first, completed newest first.
        EntityKind::Todo => {
            " ORDER BY status ASC,
                CASE WHEN status = 0 THEN created_at END ASC,
                CASE WHEN status = 1 THEN created_at END DESC,
                id ASC"
        }
        _ => " ORDER BY created_at DESC, id ASC",
    }
}

fn parse_entity_row(kind: EntityKind, row: &Row<'_>) -> StoreResult<Entity> {
    let id_text: String = row.get("id")?;
    let id = parse_entity_id(&id_text, kind)?;

    let fields = match kind {
        EntityKind::Place => KindFields::Place {
            lat: row.get("lat")?,
            lng: row.get("lng")?,
        },
        EntityKind::Person => KindFields::Person,
        EntityKind::Note => KindFields::Note {
            content: row.get("content")?,
        },
        EntityKind::Image => KindFields::Image {
            storage_path: row.get("storage_path")?,
        },
        EntityKind::File => KindFields::File {
            storage_path: row.get("storage_path")?,
        },
        EntityKind::Todo => KindFields::Todo {
            status: parse_status(row.get("status")?, kind)?,
        },
        EntityKind::CustomObject => KindFields::CustomObject {
            object_type: row.get("object_type")?,
            mood: row.get("mood")?,
        },
    };

    Ok(Entity {
        id,
        kind,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        fields,
    })
}

fn parse_summary_row(row: &Row<'_>) -> StoreResult<EntitySummary> {
    let kind_text: String = row.get("kind")?;
    let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid kind `{kind_text}` in recency listing"))
    })?;
    let id_text: String = row.get("id")?;
    let id = parse_entity_id(&id_text, kind)?;

    let status = match row.get::<_, Option<i64>>("status")? {
        Some(value) => Some(parse_status(value, kind)?),
        None => None,
    };

    Ok(EntitySummary {
        id,
        kind,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        object_type: row.get("object_type")?,
        storage_path: row.get("storage_path")?,
        status,
        content: None,
    })
}

fn parse_status(value: i64, kind: EntityKind) -> StoreResult<TodoStatus> {
    TodoStatus::parse_db(value).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid status value `{value}` in {}.status",
            kind.table()
        ))
    })
}

fn parse_entity_id(value: &str, kind: EntityKind) -> StoreResult<EntityId> {
    Uuid::parse_str(value).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{value}` in {}.id", kind.table()))
    })
}
