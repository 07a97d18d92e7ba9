//! Link delete policies.
//!
//! # Responsibility
//! - Map `(source entity type, link type)` to a [`DeleteAction`].
//! - Load the mapping from entity-type definitions.
//!
//! # Invariants
//! - The action set is closed: `Cascade` or `Break`.
//! - Any link type without a configured action resolves to `Break`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod registry;
pub mod resolver;

/// What deleting a link's source does to the link's target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteAction {
    /// Delete the target too, unless something outside the deletion still
    /// references it.
    Cascade,
    /// Remove the link only.
    #[default]
    Break,
}

impl DeleteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Break => "break",
        }
    }
}

/// Source of configured link delete actions.
///
/// Implementations return `Ok(None)` for link types they do not configure and
/// `Err` only when the configuration itself cannot be consulted.
pub trait LinkPolicySource {
    fn get_policy(
        &self,
        source_type_key: &str,
        link_type_key: &str,
    ) -> Result<Option<DeleteAction>, PolicyError>;
}

impl<T: LinkPolicySource + ?Sized> LinkPolicySource for &T {
    fn get_policy(
        &self,
        source_type_key: &str,
        link_type_key: &str,
    ) -> Result<Option<DeleteAction>, PolicyError> {
        (**self).get_policy(source_type_key, link_type_key)
    }
}

/// Policy lookup failure. Always fatal to plan computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    Unavailable {
        source_type_key: String,
        link_type_key: String,
        reason: String,
    },
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable {
                source_type_key,
                link_type_key,
                reason,
            } => write!(
                f,
                "link policy unavailable for `{source_type_key}`/`{link_type_key}`: {reason}"
            ),
        }
    }
}

impl Error for PolicyError {}
