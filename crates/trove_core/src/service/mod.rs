//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate entity, key-value, link, media and geo operations into
//!   use-case level APIs.
//! - Keep transport layers decoupled from storage details.

pub mod object_service;
