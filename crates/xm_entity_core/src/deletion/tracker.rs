//! Visited-set bookkeeping for one planning pass.

use crate::model::entity::EntityId;
use std::collections::BTreeSet;

/// Entities already admitted to the deletion closure.
///
/// Admission happens once per entity, which is what makes traversal of
/// cyclic link graphs (including self-links) terminate.
#[derive(Debug, Default, Clone)]
pub struct ReachabilityTracker {
    visited: BTreeSet<EntityId>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`. Returns `false` when it was already recorded and must
    /// not be processed again.
    pub fn mark_visited(&mut self, id: EntityId) -> bool {
        self.visited.insert(id)
    }

    pub fn is_visited(&self, id: &EntityId) -> bool {
        self.visited.contains(id)
    }

    /// The closure admitted so far.
    pub fn closure(&self) -> &BTreeSet<EntityId> {
        &self.visited
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ReachabilityTracker;
    use uuid::Uuid;

    #[test]
    fn second_mark_is_rejected() {
        let mut tracker = ReachabilityTracker::new();
        let id = Uuid::new_v4();
        assert!(tracker.mark_visited(id));
        assert!(!tracker.mark_visited(id));
        assert!(tracker.is_visited(&id));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn closure_reflects_marked_ids() {
        let mut tracker = ReachabilityTracker::new();
        assert!(tracker.is_empty());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        tracker.mark_visited(first);
        tracker.mark_visited(second);
        assert!(tracker.closure().contains(&first));
        assert!(tracker.closure().contains(&second));
        assert!(!tracker.is_visited(&Uuid::new_v4()));
    }
}
