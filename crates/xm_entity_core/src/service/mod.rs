//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and deletion-engine calls into use-case APIs.
//! - Own transaction boundaries for multi-step operations.

pub mod deletion_service;
pub mod entity_service;
