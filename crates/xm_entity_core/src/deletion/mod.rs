//! Entity deletion engine.
//!
//! # Responsibility
//! - Decide which entities disappear with a deleted root, which links are
//!   only broken, and which entities survive because something else still
//!   references them.
//! - Apply that decision against the store as one all-or-nothing unit.
//!
//! # Invariants
//! - Composition children are deleted with their owner, never planned as
//!   graph nodes.
//! - A non-root entity is planned for deletion only when it is reached
//!   through `Cascade` links and has no incoming link from outside the
//!   closure being deleted.
//! - A plan is never re-derived or resumed after a failed execution; callers
//!   restart from planning.

use crate::db::DbError;
use crate::model::composition::ChildRef;
use crate::model::entity::EntityId;
use crate::model::link::LinkId;
use crate::policy::PolicyError;
use crate::repo::entity_repo::RepoError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod executor;
pub mod guard;
pub mod plan;
pub mod planner;
pub mod tracker;

pub use executor::DeleteExecutor;
pub use guard::SharedReferenceGuard;
pub use plan::{DeleteAck, DeletionPlan};
pub use planner::CascadeDeletePlanner;
pub use tracker::ReachabilityTracker;

pub type DeleteResult<T> = Result<T, DeleteError>;

/// Lifecycle of one delete request. `Planned` is never observable outside
/// the request when execution aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    Requested,
    Planned,
    Executing,
    Committed,
    Aborted,
}

impl DeleteState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Planned => "planned",
            Self::Executing => "executing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

/// Store row that changed between planning and execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictSubject {
    Entity {
        id: EntityId,
        expected_version: i64,
        /// `None` when the entity no longer exists.
        actual_version: Option<i64>,
    },
    Link(LinkId),
    Child(ChildRef),
    /// Another request holds the store's write lock.
    StoreBusy,
}

/// Typed outcome of a failed delete request.
#[derive(Debug)]
pub enum DeleteError {
    /// Root entity does not exist at plan time.
    NotFound(EntityId),
    PolicyUnavailable(PolicyError),
    /// A planned row changed before commit. Retry from planning.
    ConcurrentModificationConflict(ConflictSubject),
    /// A link still ties a planned entity to a surviving one at commit time.
    IntegrityViolation {
        link_id: LinkId,
        source_id: EntityId,
        target_id: EntityId,
    },
    Repo(RepoError),
}

impl DeleteError {
    /// True when the caller may retry the whole request from planning.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModificationConflict(_) | Self::IntegrityViolation { .. }
        )
    }

    /// Stable code used in log events and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::PolicyUnavailable(_) => "policy_unavailable",
            Self::ConcurrentModificationConflict(_) => "concurrent_modification",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::Repo(_) => "store_error",
        }
    }
}

impl Display for DeleteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::PolicyUnavailable(err) => write!(f, "{err}"),
            Self::ConcurrentModificationConflict(ConflictSubject::Entity {
                id,
                expected_version,
                actual_version: Some(actual),
            }) => write!(
                f,
                "entity {id} changed concurrently: planned version {expected_version}, found {actual}"
            ),
            Self::ConcurrentModificationConflict(ConflictSubject::Entity {
                id,
                expected_version,
                actual_version: None,
            }) => write!(
                f,
                "entity {id} was deleted concurrently (planned version {expected_version})"
            ),
            Self::ConcurrentModificationConflict(ConflictSubject::Link(id)) => {
                write!(f, "link {id} was removed concurrently")
            }
            Self::ConcurrentModificationConflict(ConflictSubject::Child(child)) => write!(
                f,
                "{} {} was removed concurrently",
                child.kind.as_str(),
                child.id
            ),
            Self::ConcurrentModificationConflict(ConflictSubject::StoreBusy) => {
                write!(f, "entity store is locked by a concurrent request")
            }
            Self::IntegrityViolation {
                link_id,
                source_id,
                target_id,
            } => write!(
                f,
                "link {link_id} ({source_id} -> {target_id}) still crosses the deletion boundary"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DeleteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PolicyUnavailable(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PolicyError> for DeleteError {
    fn from(value: PolicyError) -> Self {
        Self::PolicyUnavailable(value)
    }
}

impl From<RepoError> for DeleteError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::VersionConflict {
                id,
                expected,
                actual,
            } => Self::ConcurrentModificationConflict(ConflictSubject::Entity {
                id,
                expected_version: expected,
                actual_version: actual,
            }),
            RepoError::LinkNotFound(id) => {
                Self::ConcurrentModificationConflict(ConflictSubject::Link(id))
            }
            RepoError::ChildNotFound(child) => {
                Self::ConcurrentModificationConflict(ConflictSubject::Child(child))
            }
            RepoError::Db(DbError::Sqlite(err)) if is_lock_contention(&err) => {
                Self::ConcurrentModificationConflict(ConflictSubject::StoreBusy)
            }
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for DeleteError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
