//! Entity domain model.
//!
//! # Responsibility
//! - Define the canonical record shapes for every entity kind.
//! - Provide creation drafts, field patches and display summaries.
//!
//! # Invariants
//! - `EntityKind` is closed; storage table names never come from input.
//! - `EntityRef` ordering is total and stable, so link endpoints can be
//!   canonicalized by simple comparison.
//! - Custom object types are persisted as normalized slugs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier for every entity row.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = Uuid;

/// Closed set of record kinds.
///
/// Every kind maps to exactly one storage table; dispatch always goes
/// through this enum so user input can never select a table by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Place,
    Person,
    Note,
    Image,
    File,
    Todo,
    CustomObject,
}

impl EntityKind {
    /// All kinds in a fixed enumeration order (used by cross-kind queries).
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Place,
        EntityKind::Person,
        EntityKind::Note,
        EntityKind::Image,
        EntityKind::File,
        EntityKind::Todo,
        EntityKind::CustomObject,
    ];

    /// Stable slug used in link tokens and the shared tables.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Person => "person",
            Self::Note => "note",
            Self::Image => "image",
            Self::File => "file",
            Self::Todo => "todo",
            Self::CustomObject => "custom_object",
        }
    }

    /// Storage table for this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Place => "places",
            Self::Person => "people",
            Self::Note => "notes",
            Self::Image => "images",
            Self::File => "files",
            Self::Todo => "todos",
            Self::CustomObject => "custom_objects",
        }
    }

    /// Parses a kind slug. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "place" => Some(Self::Place),
            "person" => Some(Self::Person),
            "note" => Some(Self::Note),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            "todo" => Some(Self::Todo),
            "custom_object" => Some(Self::CustomObject),
            _ => None,
        }
    }

    /// Whether rows of this kind own a file in the managed media root.
    pub fn has_managed_file(self) -> bool {
        matches!(self, Self::Image | Self::File)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-kind address of one entity.
///
/// Ordering is (kind slug, id) and is the canonical endpoint order for
/// undirected link storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    /// Parses a `kind:id` link token. Returns `None` for malformed input.
    pub fn parse_token(token: &str) -> Option<Self> {
        let (kind_text, id_text) = token.split_once(':')?;
        let kind = EntityKind::parse(kind_text.trim())?;
        let id = Uuid::parse_str(id_text.trim()).ok()?;
        Some(Self { kind, id })
    }

    /// Serializes this ref as a `kind:id` link token.
    pub fn token(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

impl PartialOrd for EntityRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.kind.as_str(), self.id).cmp(&(other.kind.as_str(), other.id))
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Todo lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Incomplete,
    Complete,
}

impl TodoStatus {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Incomplete => 0,
            Self::Complete => 1,
        }
    }

    pub fn parse_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Incomplete),
            1 => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Validation failures for entity drafts and patches.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    EmptyObjectType,
    CoordinateOutOfRange { lat: f64, lng: f64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyObjectType => write!(f, "object_type must not be empty"),
            Self::CoordinateOutOfRange { lat, lng } => {
                write!(f, "coordinate out of range: lat={lat} lng={lng}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Creation request for one entity.
///
/// One variant per kind keeps required fields present by construction;
/// `validate` only has to check value constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityDraft {
    Place {
        title: String,
        lat: f64,
        lng: f64,
    },
    Person {
        title: String,
    },
    Note {
        title: String,
        content: String,
    },
    Image {
        title: String,
        storage_path: String,
    },
    File {
        title: String,
        storage_path: String,
    },
    Todo {
        title: String,
    },
    CustomObject {
        title: String,
        object_type: String,
        mood: i64,
    },
}

impl EntityDraft {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Place { .. } => EntityKind::Place,
            Self::Person { .. } => EntityKind::Person,
            Self::Note { .. } => EntityKind::Note,
            Self::Image { .. } => EntityKind::Image,
            Self::File { .. } => EntityKind::File,
            Self::Todo { .. } => EntityKind::Todo,
            Self::CustomObject { .. } => EntityKind::CustomObject,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Place { title, .. }
            | Self::Person { title }
            | Self::Note { title, .. }
            | Self::Image { title, .. }
            | Self::File { title, .. }
            | Self::Todo { title }
            | Self::CustomObject { title, .. } => title,
        }
    }

    /// Checks value constraints for this draft.
    ///
    /// # Invariants
    /// - Titles must be non-blank for every kind.
    /// - Place coordinates must be finite and inside WGS84 bounds.
    /// - Custom object types must normalize to a non-empty slug.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title().trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        match self {
            Self::Place { lat, lng, .. } => {
                if !coordinate_in_range(*lat, *lng) {
                    return Err(ValidationError::CoordinateOutOfRange {
                        lat: *lat,
                        lng: *lng,
                    });
                }
            }
            Self::CustomObject { object_type, .. } => {
                if normalize_object_type(object_type).is_none() {
                    return Err(ValidationError::EmptyObjectType);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Whitelisted single-field mutation.
///
/// The closed enum makes the patch whitelist exhaustive: `Title` applies
/// to every kind, `Status` only to Todo, `Content` only to Note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldPatch {
    Title(String),
    Status(TodoStatus),
    Content(String),
}

impl FieldPatch {
    /// Field name used in diagnostics and `InvalidField` errors.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Status(_) => "status",
            Self::Content(_) => "content",
        }
    }
}

/// Kind-specific payload of one persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFields {
    Place { lat: f64, lng: f64 },
    Person,
    Note { content: String },
    Image { storage_path: String },
    File { storage_path: String },
    Todo { status: TodoStatus },
    CustomObject { object_type: String, mood: i64 },
}

/// One persisted entity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub title: String,
    /// Epoch milliseconds, assigned by the store at creation.
    pub created_at: i64,
    pub fields: KindFields,
}

impl Entity {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }

    /// Relative managed-file path, when this kind owns one.
    pub fn storage_path(&self) -> Option<&str> {
        match &self.fields {
            KindFields::Image { storage_path } | KindFields::File { storage_path } => {
                Some(storage_path)
            }
            _ => None,
        }
    }
}

/// Display projection of one entity for cross-kind listings and the
/// related-items view. Kind-specific extras are optional so one shape
/// serves every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub title: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl EntitySummary {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }

    /// Kind-specific projection of one full entity row.
    pub fn from_entity(entity: &Entity) -> Self {
        let mut summary = Self {
            id: entity.id,
            kind: entity.kind,
            title: entity.title.clone(),
            created_at: entity.created_at,
            object_type: None,
            storage_path: None,
            status: None,
            content: None,
        };
        match &entity.fields {
            KindFields::Place { .. } | KindFields::Person => {}
            KindFields::Note { content } => summary.content = Some(content.clone()),
            KindFields::Image { storage_path } | KindFields::File { storage_path } => {
                summary.storage_path = Some(storage_path.clone());
            }
            KindFields::Todo { status } => summary.status = Some(*status),
            KindFields::CustomObject { object_type, .. } => {
                summary.object_type = Some(object_type.clone());
            }
        }
        summary
    }
}

/// Normalizes a user-supplied custom object type to its stored slug:
/// trimmed, lowercased, inner whitespace runs collapsed to `-`.
///
/// Returns `None` when nothing remains after trimming.
pub fn normalize_object_type(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        WHITESPACE_RUN_RE
            .replace_all(&trimmed.to_lowercase(), "-")
            .into_owned(),
    )
}

fn coordinate_in_range(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
