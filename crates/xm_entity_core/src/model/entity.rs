//! Entity node model.
//!
//! # Responsibility
//! - Define the canonical entity record stored in `xm_entity`.
//! - Carry the optimistic-concurrency version used by writers and the
//!   deletion engine.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - `version` only ever grows; every persisted mutation increments it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an entity node.
pub type EntityId = Uuid;

/// Canonical entity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmEntity {
    pub id: EntityId,
    /// Business key, unique per tenant by convention only.
    pub key: String,
    /// Entity type key; selects the link policies applied on delete.
    pub type_key: String,
    pub name: String,
    /// Optimistic lock counter. Starts at `0` on creation.
    pub version: i64,
    /// Epoch ms. Assigned by storage.
    pub created_at: i64,
    /// Epoch ms. Assigned by storage.
    pub updated_at: i64,
}

impl XmEntity {
    /// Creates a new, not yet persisted entity with a generated id.
    pub fn new(
        key: impl Into<String>,
        type_key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            type_key: type_key.into(),
            name: name.into(),
            version: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Checks field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.key.trim().is_empty() {
            return Err(EntityValidationError::BlankKey);
        }
        if self.type_key.trim().is_empty() {
            return Err(EntityValidationError::BlankTypeKey);
        }
        if self.name.is_empty() {
            return Err(EntityValidationError::EmptyName);
        }
        if self.version < 0 {
            return Err(EntityValidationError::NegativeVersion(self.version));
        }
        Ok(())
    }
}

/// Field validation failures for [`XmEntity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    BlankKey,
    BlankTypeKey,
    EmptyName,
    NegativeVersion(i64),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankKey => write!(f, "entity key must not be blank"),
            Self::BlankTypeKey => write!(f, "entity type key must not be blank"),
            Self::EmptyName => write!(f, "entity name must not be empty"),
            Self::NegativeVersion(version) => {
                write!(f, "entity version must not be negative, got {version}")
            }
        }
    }
}

impl Error for EntityValidationError {}

#[cfg(test)]
mod tests {
    use super::{EntityValidationError, XmEntity};

    #[test]
    fn new_entity_starts_at_version_zero() {
        let entity = XmEntity::new("K-1", "TEST_DELETE", "name");
        assert_eq!(entity.version, 0);
        assert!(entity.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_keys() {
        let entity = XmEntity::new("  ", "TEST_DELETE", "name");
        assert_eq!(entity.validate(), Err(EntityValidationError::BlankKey));

        let entity = XmEntity::new("K-1", "", "name");
        assert_eq!(entity.validate(), Err(EntityValidationError::BlankTypeKey));
    }

    #[test]
    fn whitespace_name_is_allowed() {
        let entity = XmEntity::new("K-1", "TEST_DELETE", " ");
        assert!(entity.validate().is_ok());
    }
}
