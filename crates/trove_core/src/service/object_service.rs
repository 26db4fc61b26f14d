//! Object orchestration service.
//!
//! # Responsibility
//! - Run multi-step create/delete sequences across the entity,
//!   key-value and link stores, the media directory and the geo matcher.
//! - Assemble the detail view (entity + key-values + related items).
//!
//! # Invariants
//! - Multi-step store sequences (create with attachments, cascade
//!   delete, geo match-or-create) run inside one IMMEDIATE transaction.
//! - A deleted entity leaves no key-values, no edges and no managed file
//!   behind.
//! - Per-upload ingest failures never abort the batch.

use crate::geo::matcher::GeoMatcher;
use crate::ingest::media_store::MediaStore;
use crate::ingest::pipeline::{
    file_extension, process_image, stored_file_name, ProcessedImage,
};
use crate::model::entity::{
    Entity, EntityDraft, EntityKind, EntityRef, EntitySummary, FieldPatch,
};
use crate::repo::entity_repo::{
    delete_entity_row, insert_entity, load_required, EntityListQuery, EntityRepository,
    SqliteEntityRepository,
};
use crate::repo::key_value_repo::{
    add_key_value, delete_key_values_for, list_key_values, KeyValue, KeyValueRepository,
    SqliteKeyValueRepository,
};
use crate::repo::link_repo::{
    add_edge, remove_all_edges_for, LinkRepository, SqliteLinkRepository, DEFAULT_EXPANSION_DEPTH,
};
use crate::repo::{StoreError, StoreResult};
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error for orchestration-level operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Persistence-layer failure (validation, not-found, SQL transport).
    Store(StoreError),
    /// Managed-file filesystem failure.
    Io(io::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "managed file operation failed: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(value))
    }
}

impl From<io::Error> for ServiceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// One raw upload handed in by the transport layer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// One upload dropped from a batch, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedUpload {
    pub original_name: String,
    pub reason: String,
}

/// Detail view: entity plus attributes plus two-hop related items.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDetails {
    pub entity: Entity,
    pub key_values: Vec<KeyValue>,
    pub related: Vec<EntitySummary>,
}

/// Result of one image batch ingestion.
#[derive(Debug, Default)]
pub struct ImageBatchOutcome {
    pub images: Vec<EntityDetails>,
    /// Places created by geo matching during this batch.
    pub created_places: Vec<Entity>,
    pub skipped: Vec<SkippedUpload>,
}

/// Result of one generic file batch ingestion.
#[derive(Debug, Default)]
pub struct FileBatchOutcome {
    pub files: Vec<EntityDetails>,
    pub skipped: Vec<SkippedUpload>,
}

/// Startup view for the map/overview screen.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapView {
    pub places: Vec<Entity>,
    pub has_objects: bool,
}

/// Use-case orchestration over one migrated connection.
pub struct ObjectService<'conn> {
    conn: &'conn Connection,
    media: MediaStore,
    geo: GeoMatcher,
    expansion_depth: u32,
}

impl<'conn> ObjectService<'conn> {
    /// Creates a service over a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, media: MediaStore) -> ServiceResult<Self> {
        crate::repo::ensure_store_connection_ready(conn)?;
        Ok(Self {
            conn,
            media,
            geo: GeoMatcher::default(),
            expansion_depth: DEFAULT_EXPANSION_DEPTH,
        })
    }

    /// Overrides the related-items expansion depth (default 2).
    pub fn with_expansion_depth(mut self, depth: u32) -> Self {
        self.expansion_depth = depth;
        self
    }

    /// Overrides the geo matcher (tolerance radius).
    pub fn with_geo_matcher(mut self, geo: GeoMatcher) -> Self {
        self.geo = geo;
        self
    }

    /// Creates one entity with optional attributes and links.
    ///
    /// Key-value pairs with an empty key or value are skipped; link
    /// tokens that do not parse, or that point at the new entity itself,
    /// are dropped without error.
    pub fn create_entity(
        &self,
        draft: &EntityDraft,
        key_values: &[(String, String)],
        link_tokens: &[String],
    ) -> ServiceResult<EntityDetails> {
        draft.validate().map_err(StoreError::Validation)?;

        let id = Uuid::new_v4();
        let entity = EntityRef::new(draft.kind(), id);

        let tx = self.begin()?;
        insert_entity(&tx, id, draft)?;
        let kv_count = attach_key_values(&tx, entity, key_values)?;
        let link_count = attach_links(&tx, entity, link_tokens)?;
        tx.commit()?;

        info!(
            "event=entity_create module=service status=ok kind={} id={} kv_count={kv_count} link_count={link_count}",
            entity.kind, entity.id
        );
        self.required_details(entity)
    }

    /// Ingests a batch of image uploads.
    ///
    /// Failed uploads are skipped and reported; successful ones are
    /// normalized, stored, persisted and geo-linked when GPS is present.
    pub fn create_images(
        &self,
        uploads: &[Upload],
        link_tokens: &[String],
    ) -> ServiceResult<ImageBatchOutcome> {
        let mut outcome = ImageBatchOutcome::default();

        for upload in uploads {
            let processed = match process_image(&upload.bytes, &upload.original_name) {
                Ok(processed) => processed,
                Err(err) => {
                    warn!(
                        "event=image_ingest module=service status=skipped reason=processing error={err}"
                    );
                    outcome.skipped.push(SkippedUpload {
                        original_name: upload.original_name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let storage_path = match self.media.write_image(&processed.file_name, &processed.jpeg)
            {
                Ok(path) => path,
                Err(err) => {
                    warn!(
                        "event=image_ingest module=service status=skipped reason=io error={err}"
                    );
                    outcome.skipped.push(SkippedUpload {
                        original_name: upload.original_name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match self.persist_image(&processed, &storage_path, link_tokens) {
                Ok((details, created_place)) => {
                    if let Some(place) = created_place {
                        outcome.created_places.push(place);
                    }
                    outcome.images.push(details);
                }
                Err(err) => {
                    // The row never landed; drop the orphaned file before
                    // surfacing the store failure.
                    let _ = self.media.remove(&storage_path);
                    return Err(err);
                }
            }
        }

        info!(
            "event=image_ingest module=service status=ok ingested={} places_created={} skipped={}",
            outcome.images.len(),
            outcome.created_places.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Stores a batch of generic (non-image) file uploads.
    pub fn create_files(
        &self,
        uploads: &[Upload],
        link_tokens: &[String],
    ) -> ServiceResult<FileBatchOutcome> {
        let mut outcome = FileBatchOutcome::default();

        for upload in uploads {
            let file_name = stored_file_name(
                Utc::now().date_naive(),
                file_extension(&upload.original_name).as_deref(),
            );
            let storage_path = match self.media.write_file(&file_name, &upload.bytes) {
                Ok(path) => path,
                Err(err) => {
                    warn!(
                        "event=file_ingest module=service status=skipped reason=io error={err}"
                    );
                    outcome.skipped.push(SkippedUpload {
                        original_name: upload.original_name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let draft = EntityDraft::File {
                title: upload.original_name.clone(),
                storage_path: storage_path.clone(),
            };
            match self.persist_upload_row(&draft, link_tokens) {
                Ok(details) => outcome.files.push(details),
                Err(err) => {
                    let _ = self.media.remove(&storage_path);
                    return Err(err);
                }
            }
        }

        info!(
            "event=file_ingest module=service status=ok stored={} skipped={}",
            outcome.files.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Deletes one entity with full cascade.
    ///
    /// The backing file (if any) goes first, tolerating prior absence;
    /// key-values, edges and the row are then removed in one
    /// transaction. A missing entity is an error.
    pub fn delete_entity(&self, entity: EntityRef) -> ServiceResult<()> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        let Some(record) = repo.get(entity)? else {
            return Err(StoreError::NotFound(entity).into());
        };

        if let Some(storage_path) = record.storage_path() {
            let removed = self.media.remove(storage_path)?;
            if !removed {
                debug!(
                    "event=entity_delete module=service status=ok note=backing_file_already_absent id={}",
                    entity.id
                );
            }
        }

        let tx = self.begin()?;
        let kv_removed = delete_key_values_for(&tx, entity)?;
        let edges_removed = remove_all_edges_for(&tx, entity)?;
        delete_entity_row(&tx, entity)?;
        tx.commit()?;

        info!(
            "event=entity_delete module=service status=ok kind={} id={} kv_removed={kv_removed} edges_removed={edges_removed}",
            entity.kind, entity.id
        );
        Ok(())
    }

    /// Loads one entity with attributes and resolved related items.
    ///
    /// Related refs are the bounded breadth-first expansion of the link
    /// graph; refs whose target no longer exists are dropped.
    pub fn fetch_with_related(&self, entity: EntityRef) -> ServiceResult<Option<EntityDetails>> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        let Some(record) = repo.get(entity)? else {
            return Ok(None);
        };
        Ok(Some(self.assemble_details(record)?))
    }

    /// Applies one whitelisted field patch.
    pub fn update_field(&self, entity: EntityRef, patch: &FieldPatch) -> ServiceResult<()> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        repo.update_field(entity, patch)?;
        Ok(())
    }

    /// Adds one key-value pair, returning its row id.
    pub fn add_key_value(&self, entity: EntityRef, key: &str, value: &str) -> ServiceResult<i64> {
        let repo = SqliteKeyValueRepository::try_new(self.conn)?;
        Ok(repo.add(entity, key, value)?)
    }

    /// Replaces one key-value pair by row id.
    pub fn update_key_value(&self, kv_id: i64, key: &str, value: &str) -> ServiceResult<()> {
        let repo = SqliteKeyValueRepository::try_new(self.conn)?;
        repo.update(kv_id, key, value)?;
        Ok(())
    }

    /// Deletes one key-value pair by row id.
    pub fn delete_key_value(&self, kv_id: i64) -> ServiceResult<()> {
        let repo = SqliteKeyValueRepository::try_new(self.conn)?;
        repo.delete(kv_id)?;
        Ok(())
    }

    /// Links two entities. Self-links are ignored.
    pub fn link(&self, a: EntityRef, b: EntityRef) -> ServiceResult<bool> {
        let repo = SqliteLinkRepository::try_new(self.conn)?;
        Ok(repo.add_edge(a, b)?)
    }

    /// Unlinks two entities regardless of insertion direction.
    pub fn unlink(&self, a: EntityRef, b: EntityRef) -> ServiceResult<bool> {
        let repo = SqliteLinkRepository::try_new(self.conn)?;
        Ok(repo.remove_edge(a, b)?)
    }

    /// Lists entities of one kind.
    pub fn list(&self, kind: EntityKind, query: &EntityListQuery) -> ServiceResult<Vec<Entity>> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        Ok(repo.list(kind, query)?)
    }

    /// Cross-kind recency listing (incomplete todos pinned first).
    pub fn list_recent(&self, limit: u32, offset: u32) -> ServiceResult<Vec<EntitySummary>> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        Ok(repo.list_recent(limit, offset)?)
    }

    /// Startup view: every place plus whether any entity exists.
    pub fn bootstrap(&self) -> ServiceResult<BootstrapView> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        let places = repo.list(EntityKind::Place, &EntityListQuery::default())?;
        let has_objects = repo.count_all()? > 0;
        Ok(BootstrapView {
            places,
            has_objects,
        })
    }

    /// Distinct custom-object type slugs.
    pub fn custom_object_types(&self) -> ServiceResult<Vec<String>> {
        let repo = SqliteEntityRepository::try_new(self.conn)?;
        Ok(repo.distinct_custom_object_types()?)
    }

    /// Distinct key-value keys.
    pub fn key_value_keys(&self) -> ServiceResult<Vec<String>> {
        let repo = SqliteKeyValueRepository::try_new(self.conn)?;
        Ok(repo.distinct_keys()?)
    }

    fn begin(&self) -> ServiceResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Persists one normalized image row plus its links and geo match.
    ///
    /// Returns the image details and the Place created by the matcher,
    /// when one was.
    fn persist_image(
        &self,
        processed: &ProcessedImage,
        storage_path: &str,
        link_tokens: &[String],
    ) -> ServiceResult<(EntityDetails, Option<Entity>)> {
        let id = Uuid::new_v4();
        let entity = EntityRef::new(EntityKind::Image, id);
        let draft = EntityDraft::Image {
            title: processed.title.clone(),
            storage_path: storage_path.to_string(),
        };

        let tx = self.begin()?;
        insert_entity(&tx, id, &draft)?;
        attach_links(&tx, entity, link_tokens)?;

        let mut created_place = None;
        if let Some(gps) = processed.gps {
            // Match-or-create must share this transaction; outside it two
            // concurrent ingests could both miss and insert twin places.
            let matched = self
                .geo
                .match_or_create(&tx, gps.lat, gps.lng, &processed.title)?;
            add_edge(&tx, entity, matched.place.entity_ref())?;
            if matched.created {
                created_place = Some(matched.place);
            }
        }
        tx.commit()?;

        let details = self.required_details(entity)?;
        Ok((details, created_place))
    }

    /// Persists one stored-upload row (generic file) plus its links.
    fn persist_upload_row(
        &self,
        draft: &EntityDraft,
        link_tokens: &[String],
    ) -> ServiceResult<EntityDetails> {
        let id = Uuid::new_v4();
        let entity = EntityRef::new(draft.kind(), id);

        let tx = self.begin()?;
        insert_entity(&tx, id, draft)?;
        attach_links(&tx, entity, link_tokens)?;
        tx.commit()?;

        self.required_details(entity)
    }

    fn required_details(&self, entity: EntityRef) -> ServiceResult<EntityDetails> {
        let record = load_required(self.conn, entity)?;
        Ok(self.assemble_details(record)?)
    }

    fn assemble_details(&self, record: Entity) -> StoreResult<EntityDetails> {
        let entity = record.entity_ref();
        let key_values = list_key_values(self.conn, entity)?;

        let link_repo = SqliteLinkRepository::try_new(self.conn)?;
        let entity_repo = SqliteEntityRepository::try_new(self.conn)?;
        let mut related = Vec::new();
        for reference in link_repo.expand(entity, self.expansion_depth)? {
            // Dangling edges resolve to nothing and are silently dropped.
            if let Some(target) = entity_repo.get(reference)? {
                related.push(EntitySummary::from_entity(&target));
            }
        }

        Ok(EntityDetails {
            entity: record,
            key_values,
            related,
        })
    }
}

/// Stores the usable subset of requested key-value pairs.
fn attach_key_values(
    conn: &Connection,
    entity: EntityRef,
    key_values: &[(String, String)],
) -> StoreResult<usize> {
    let mut attached = 0;
    for (key, value) in key_values {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        add_key_value(conn, entity, key, value)?;
        attached += 1;
    }
    Ok(attached)
}

/// Attaches the resolvable subset of requested link tokens.
fn attach_links(conn: &Connection, source: EntityRef, link_tokens: &[String]) -> StoreResult<usize> {
    let mut attached = 0;
    for token in link_tokens {
        let Some(target) = EntityRef::parse_token(token) else {
            debug!("event=link_attach module=service status=skipped reason=malformed_token");
            continue;
        };
        if target == source {
            debug!("event=link_attach module=service status=skipped reason=self_reference");
            continue;
        }
        if add_edge(conn, source, target)? {
            attached += 1;
        }
    }
    Ok(attached)
}
