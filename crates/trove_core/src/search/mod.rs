//! Cross-kind search entry points.
//!
//! # Responsibility
//! - Expose title lookup across every entity kind.
//! - Keep search result shaping inside core.

pub mod title;
