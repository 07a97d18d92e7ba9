//! Association link model.
//!
//! A link is a typed, non-exclusive reference from one entity to another.
//! Several links of different types and from different sources may target
//! the same entity; none of them implies ownership.

use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an association link.
pub type LinkId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    /// Link type key, resolved to a delete action per source entity type.
    pub type_key: String,
    pub source_id: EntityId,
    pub target_id: EntityId,
}

impl Link {
    /// Creates a new, not yet persisted link with a generated id.
    pub fn new(type_key: impl Into<String>, source_id: EntityId, target_id: EntityId) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_key: type_key.into(),
            source_id,
            target_id,
        }
    }

    pub fn is_self_link(&self) -> bool {
        self.source_id == self.target_id
    }

    pub fn validate(&self) -> Result<(), LinkValidationError> {
        if self.type_key.trim().is_empty() {
            return Err(LinkValidationError::BlankTypeKey);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkValidationError {
    BlankTypeKey,
}

impl Display for LinkValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTypeKey => write!(f, "link type key must not be blank"),
        }
    }
}

impl Error for LinkValidationError {}
