//! Application of a [`DeletionPlan`] against the store.

use super::plan::{DeleteAck, DeletionPlan};
use super::{ConflictSubject, DeleteError, DeleteResult};
use crate::model::entity::EntityId;
use crate::repo::entity_store::EntityStore;
use log::debug;
use std::collections::BTreeSet;

/// Applies plans inside the caller's transaction.
///
/// The executor never commits. Any error it returns leaves the transaction
/// dirty; the caller must roll it back and replan.
pub struct DeleteExecutor<'s, S: EntityStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: EntityStore + ?Sized> DeleteExecutor<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Removes every planned link, child and entity.
    ///
    /// Order: version re-validation, link removal, boundary check, children,
    /// entities.
    pub fn execute(&self, plan: &DeletionPlan) -> DeleteResult<DeleteAck> {
        self.revalidate_versions(plan)?;

        let edge_ids = plan.edge_ids();
        self.store.delete_edges(&edge_ids)?;
        self.ensure_no_crossing_links(plan)?;

        let deleted_children = self.store.delete_composition_children(plan.children())?;
        self.store.delete_nodes(plan.nodes())?;

        debug!(
            "event=delete_execute module=deletion status=ok root={} nodes={} edges={} children={}",
            plan.root(),
            plan.nodes().len(),
            edge_ids.len(),
            deleted_children
        );

        Ok(DeleteAck {
            root: plan.root(),
            deleted_nodes: plan.nodes().iter().map(|node| node.id).collect(),
            broken_edges: plan.edges_to_break().map(|link| link.id).collect(),
            removed_edges: plan.internal_edges().map(|link| link.id).collect(),
            deleted_children,
        })
    }

    fn revalidate_versions(&self, plan: &DeletionPlan) -> DeleteResult<()> {
        for planned in plan.nodes() {
            let actual_version = self.store.get_node(planned.id)?.map(|node| node.version);
            if actual_version != Some(planned.version) {
                return Err(DeleteError::ConcurrentModificationConflict(
                    ConflictSubject::Entity {
                        id: planned.id,
                        expected_version: planned.version,
                        actual_version,
                    },
                ));
            }
        }
        Ok(())
    }

    /// After planned links are gone, no link may touch a planned entity.
    fn ensure_no_crossing_links(&self, plan: &DeletionPlan) -> DeleteResult<()> {
        let nothing_excluded: BTreeSet<EntityId> = BTreeSet::new();
        for planned in plan.nodes() {
            let incoming = self
                .store
                .list_incoming_edges(planned.id, &nothing_excluded)?;
            let outgoing = self.store.list_outgoing_edges(planned.id)?;
            if let Some(link) = incoming.into_iter().chain(outgoing).next() {
                return Err(DeleteError::IntegrityViolation {
                    link_id: link.id,
                    source_id: link.source_id,
                    target_id: link.target_id,
                });
            }
        }
        Ok(())
    }
}
