//! Shared-reference check for cascade candidates.

use crate::model::entity::EntityId;
use crate::model::link::Link;
use crate::repo::entity_repo::RepoResult;
use crate::repo::entity_store::EntityStore;
use std::collections::BTreeSet;

/// Decides whether a cascade candidate must survive because an entity
/// outside the deletion closure still links to it.
///
/// Every incoming link counts, whatever its type or delete action. The
/// check always queries the store, since the referencing entity may be
/// unrelated to the deletion root.
pub struct SharedReferenceGuard<'s, S: EntityStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: EntityStore + ?Sized> SharedReferenceGuard<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Incoming links of `target` whose source is outside `closure`.
    ///
    /// Self-links of `target` are not external: they disappear together
    /// with it.
    pub fn external_references(
        &self,
        target: EntityId,
        closure: &BTreeSet<EntityId>,
    ) -> RepoResult<Vec<Link>> {
        let mut links = self.store.list_incoming_edges(target, closure)?;
        links.retain(|link| !link.is_self_link());
        Ok(links)
    }

    pub fn has_external_reference(
        &self,
        target: EntityId,
        closure: &BTreeSet<EntityId>,
    ) -> RepoResult<bool> {
        Ok(!self.external_references(target, closure)?.is_empty())
    }
}
