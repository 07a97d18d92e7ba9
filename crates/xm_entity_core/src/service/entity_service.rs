//! Entity use-case service.
//!
//! # Responsibility
//! - Provide CRUD entry points for entities, links and composition children.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Deletion is not offered here; it goes through `DeletionService` so the
//!   cascade rules always apply.

use crate::model::composition::{ChildRef, CompositionKind, NewChild};
use crate::model::entity::{EntityId, XmEntity};
use crate::model::link::Link;
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};

/// Use-case service wrapper for entity CRUD operations.
pub struct EntityService<R: EntityRepository> {
    repo: R,
}

impl<R: EntityRepository> EntityService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an entity with a generated id and version `0`.
    pub fn create_entity(
        &self,
        key: impl Into<String>,
        type_key: impl Into<String>,
        name: impl Into<String>,
    ) -> RepoResult<XmEntity> {
        self.repo.create_entity(&XmEntity::new(key, type_key, name))
    }

    pub fn get_entity(&self, id: EntityId) -> RepoResult<Option<XmEntity>> {
        self.repo.get_entity(id)
    }

    pub fn exists(&self, id: EntityId) -> RepoResult<bool> {
        self.repo.exists(id)
    }

    /// Renames an entity under optimistic locking.
    ///
    /// `entity.version` must equal the stored version; the returned entity
    /// carries the incremented one.
    pub fn rename_entity(
        &self,
        entity: &XmEntity,
        name: impl Into<String>,
    ) -> RepoResult<XmEntity> {
        let mut updated = entity.clone();
        updated.name = name.into();
        self.repo.update_entity(&updated)
    }

    pub fn update_entity(&self, entity: &XmEntity) -> RepoResult<XmEntity> {
        self.repo.update_entity(entity)
    }

    /// Links `source_id` to `target_id` with `type_key`.
    pub fn link(
        &self,
        source_id: EntityId,
        type_key: impl Into<String>,
        target_id: EntityId,
    ) -> RepoResult<Link> {
        self.repo.create_link(&Link::new(type_key, source_id, target_id))
    }

    pub fn links_from(&self, source_id: EntityId) -> RepoResult<Vec<Link>> {
        self.repo.list_links_from(source_id)
    }

    pub fn links_to(&self, target_id: EntityId) -> RepoResult<Vec<Link>> {
        self.repo.list_links_to(target_id)
    }

    pub fn add_child(&self, owner_id: EntityId, child: &NewChild) -> RepoResult<ChildRef> {
        self.repo.add_child(owner_id, child)
    }

    /// Adds several children, stopping at the first failure.
    pub fn add_children(
        &self,
        owner_id: EntityId,
        children: &[NewChild],
    ) -> RepoResult<Vec<ChildRef>> {
        children
            .iter()
            .map(|child| self.repo.add_child(owner_id, child))
            .collect()
    }

    /// Counts top-level children of every kind.
    pub fn count_all_children(&self, owner_id: EntityId) -> RepoResult<usize> {
        if !self.repo.exists(owner_id)? {
            return Err(RepoError::NotFound(owner_id));
        }
        CompositionKind::ALL
            .into_iter()
            .map(|kind| self.repo.count_children(owner_id, kind))
            .sum()
    }
}
