//! Geographic matching for photo ingestion.
//!
//! # Responsibility
//! - Compute great-circle distances between coordinates.
//! - Attach candidate coordinates to existing Place entities within a
//!   tolerance radius, creating new Places otherwise.

pub mod matcher;
