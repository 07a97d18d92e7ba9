//! Entity graph domain model.
//!
//! # Responsibility
//! - Define the entity node, association link and composition child shapes.
//! - Keep validation next to the data it guards.
//!
//! # Invariants
//! - Every entity and link is identified by a stable `Uuid`.
//! - Composition children belong to exactly one owner entity and are never
//!   referenced by links.

pub mod composition;
pub mod entity;
pub mod link;
