//! Breadth-first computation of a [`DeletionPlan`].

use super::guard::SharedReferenceGuard;
use super::plan::DeletionPlan;
use super::tracker::ReachabilityTracker;
use super::{DeleteError, DeleteResult};
use crate::model::entity::EntityId;
use crate::policy::resolver::LinkPolicyResolver;
use crate::policy::{DeleteAction, LinkPolicySource};
use crate::repo::entity_repo::RepoError;
use crate::repo::entity_store::EntityStore;
use log::debug;
use std::collections::VecDeque;

/// Computes the deletion closure of a root entity.
///
/// Traversal is iterative over an index frontier into the plan's node list;
/// graph depth never grows the call stack.
///
/// The closure only grows, so a cascade target preserved early may become
/// admissible once its referrers are admitted. Preserved targets are
/// re-checked whenever the frontier drains, until a pass admits nothing.
/// The resulting node set does not depend on the order links are listed in.
pub struct CascadeDeletePlanner<'s, S: EntityStore + ?Sized, P: LinkPolicySource> {
    store: &'s S,
    guard: SharedReferenceGuard<'s, S>,
    policies: LinkPolicyResolver<P>,
}

impl<'s, S: EntityStore + ?Sized, P: LinkPolicySource> CascadeDeletePlanner<'s, S, P> {
    pub fn new(store: &'s S, policies: P) -> Self {
        Self {
            store,
            guard: SharedReferenceGuard::new(store),
            policies: LinkPolicyResolver::new(policies),
        }
    }

    /// Plans the deletion of `root_id`.
    ///
    /// # Errors
    /// - `NotFound` when the root does not exist.
    /// - `PolicyUnavailable` when any link policy cannot be resolved; no
    ///   partial plan is returned.
    pub fn plan(mut self, root_id: EntityId) -> DeleteResult<DeletionPlan> {
        let root = self
            .store
            .get_node(root_id)?
            .ok_or(DeleteError::NotFound(root_id))?;

        let mut tracker = ReachabilityTracker::new();
        tracker.mark_visited(root.id);
        let mut plan = DeletionPlan::new(root);
        let mut frontier = VecDeque::from([0_usize]);

        loop {
            self.expand(&mut frontier, &mut tracker, &mut plan)?;
            let released = self.release_preserved(&mut tracker, &mut plan)?;
            if released.is_empty() {
                break;
            }
            frontier.extend(released);
        }

        for link in self.store.list_incoming_edges(root_id, tracker.closure())? {
            plan.break_edge(link);
        }
        plan.settle_edges();

        debug!(
            "event=delete_plan module=deletion status=ok root={} nodes={} children={} preserved={} policies={}",
            root_id,
            tracker.len(),
            plan.children().len(),
            plan.preserved().len(),
            self.policies.resolved_count()
        );
        Ok(plan)
    }

    /// Drains `frontier`, classifying every outgoing link of each node.
    fn expand(
        &mut self,
        frontier: &mut VecDeque<usize>,
        tracker: &mut ReachabilityTracker,
        plan: &mut DeletionPlan,
    ) -> DeleteResult<()> {
        while let Some(index) = frontier.pop_front() {
            let (node_id, type_key) = {
                let node = plan.node_at(index);
                (node.id, node.type_key.clone())
            };

            plan.extend_children(self.store.list_composition_children(node_id)?);

            for link in self.store.list_outgoing_edges(node_id)? {
                let action = self.policies.resolve(&type_key, &link.type_key)?;
                if action == DeleteAction::Break {
                    plan.break_edge(link);
                    continue;
                }

                let target_id = link.target_id;
                if !tracker.is_visited(&target_id)
                    && self
                        .guard
                        .has_external_reference(target_id, tracker.closure())?
                {
                    debug!(
                        "event=delete_plan module=deletion status=skip reason=shared_reference node={} target={}",
                        node_id, target_id
                    );
                    plan.preserve(target_id);
                    plan.break_edge(link);
                    continue;
                }

                if !tracker.mark_visited(target_id) {
                    plan.break_edge(link);
                    continue;
                }

                plan.cascade_edge(link);
                frontier.push_back(self.admit(target_id, plan)?);
            }
        }
        Ok(())
    }

    /// Admits every preserved target whose referrers are now all planned.
    fn release_preserved(
        &self,
        tracker: &mut ReachabilityTracker,
        plan: &mut DeletionPlan,
    ) -> DeleteResult<Vec<usize>> {
        let candidates: Vec<EntityId> = plan.preserved().iter().copied().collect();
        let mut released = Vec::new();
        for target_id in candidates {
            if self
                .guard
                .has_external_reference(target_id, tracker.closure())?
            {
                continue;
            }
            if !tracker.mark_visited(target_id) {
                continue;
            }
            debug!(
                "event=delete_plan module=deletion status=progress reason=referrers_planned target={}",
                target_id
            );
            released.push(self.admit(target_id, plan)?);
        }
        Ok(released)
    }

    fn admit(&self, target_id: EntityId, plan: &mut DeletionPlan) -> DeleteResult<usize> {
        let target = self
            .store
            .get_node(target_id)?
            .ok_or(RepoError::NotFound(target_id))?;
        Ok(plan.push_node(target))
    }
}
