//! Entity store core with cascade-aware deletion.
//! This crate is the single source of truth for entity lifetime rules.

pub mod config;
pub mod db;
pub mod deletion;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, CoreConfig};
pub use deletion::{
    CascadeDeletePlanner, ConflictSubject, DeleteAck, DeleteError, DeleteExecutor, DeleteResult,
    DeleteState, DeletionPlan, ReachabilityTracker, SharedReferenceGuard,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::composition::{
    ChildId, ChildRef, CompositionKind, NewCalendarEvent, NewChild, NewVote,
};
pub use model::entity::{EntityId, EntityValidationError, XmEntity};
pub use model::link::{Link, LinkId, LinkValidationError};
pub use policy::registry::{EntityTypeRegistry, RegistryError};
pub use policy::resolver::LinkPolicyResolver;
pub use policy::{DeleteAction, LinkPolicySource, PolicyError};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use repo::entity_store::{EntityNode, EntityStore, SqliteEntityStore};
pub use service::deletion_service::DeletionService;
pub use service::entity_service::EntityService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
