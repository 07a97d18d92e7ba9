//! Composition children: sub-resources owned by exactly one entity.
//!
//! # Invariants
//! - A child row references its owner through `xm_entity_id` and nothing else
//!   references it.
//! - Nested rows (calendar events, rating votes) are owned by their parent
//!   child row and share its lifetime.

use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a composition child row.
pub type ChildId = Uuid;

/// Kind of composition child; one storage table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionKind {
    Attachment,
    Comment,
    Tag,
    Calendar,
    Location,
    Rating,
    FunctionContext,
}

impl CompositionKind {
    pub const ALL: [CompositionKind; 7] = [
        Self::Attachment,
        Self::Comment,
        Self::Tag,
        Self::Calendar,
        Self::Location,
        Self::Rating,
        Self::FunctionContext,
    ];

    /// Stable string id used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Comment => "comment",
            Self::Tag => "tag",
            Self::Calendar => "calendar",
            Self::Location => "location",
            Self::Rating => "rating",
            Self::FunctionContext => "function_context",
        }
    }
}

/// Reference to one persisted composition child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRef {
    pub kind: CompositionKind,
    pub id: ChildId,
    pub owner_id: EntityId,
}

/// Calendar event nested under a calendar child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendarEvent {
    pub type_key: String,
    pub title: String,
}

/// Vote nested under a rating child.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVote {
    pub user_key: String,
    pub value: f64,
    pub message: Option<String>,
}

/// Insert request for one composition child and its nested rows.
#[derive(Debug, Clone, PartialEq)]
pub enum NewChild {
    Attachment {
        type_key: String,
        name: String,
    },
    Comment {
        user_key: String,
        message: String,
    },
    Tag {
        type_key: String,
        name: String,
    },
    Calendar {
        type_key: String,
        name: String,
        events: Vec<NewCalendarEvent>,
    },
    Location {
        type_key: String,
        name: String,
    },
    Rating {
        type_key: String,
        votes: Vec<NewVote>,
    },
    FunctionContext {
        key: String,
        type_key: String,
    },
}

impl NewChild {
    pub fn kind(&self) -> CompositionKind {
        match self {
            Self::Attachment { .. } => CompositionKind::Attachment,
            Self::Comment { .. } => CompositionKind::Comment,
            Self::Tag { .. } => CompositionKind::Tag,
            Self::Calendar { .. } => CompositionKind::Calendar,
            Self::Location { .. } => CompositionKind::Location,
            Self::Rating { .. } => CompositionKind::Rating,
            Self::FunctionContext { .. } => CompositionKind::FunctionContext,
        }
    }
}
