//! Unified domain model for the polymorphic entity graph.
//!
//! # Responsibility
//! - Define the closed set of entity kinds and their typed records.
//! - Keep cross-kind addressing (`EntityRef`) in one canonical shape.
//!
//! # Invariants
//! - An entity is addressed by the (kind, id) pair; the id alone is not
//!   unique across kinds.
//! - Kind-specific required fields exist by construction in `EntityDraft`.

pub mod entity;
