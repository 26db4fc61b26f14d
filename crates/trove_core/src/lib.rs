//! Core domain logic for trove, a personal knowledge store.
//! This crate is the single source of truth for business invariants:
//! the polymorphic entity/link graph and the photo-ingest pipeline.

pub mod db;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use geo::matcher::{haversine_km, GeoMatch, GeoMatcher, PLACE_MATCH_TOLERANCE_KM};
pub use ingest::media_store::MediaStore;
pub use ingest::metadata::{CaptureMetadata, GpsCoordinates};
pub use ingest::pipeline::{process_image, ProcessedImage};
pub use ingest::{IngestError, IngestResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{
    Entity, EntityDraft, EntityId, EntityKind, EntityRef, EntitySummary, FieldPatch, KindFields,
    TodoStatus, ValidationError,
};
pub use repo::entity_repo::{EntityListQuery, EntityRepository, SqliteEntityRepository};
pub use repo::key_value_repo::{KeyValue, KeyValueRepository, SqliteKeyValueRepository};
pub use repo::link_repo::{LinkRepository, SqliteLinkRepository, DEFAULT_EXPANSION_DEPTH};
pub use repo::{StoreError, StoreResult};
pub use search::title::{search_titles, TitleHit, TitleQuery};
pub use service::object_service::{
    BootstrapView, EntityDetails, FileBatchOutcome, ImageBatchOutcome, ObjectService,
    ServiceError, ServiceResult, SkippedUpload, Upload,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
