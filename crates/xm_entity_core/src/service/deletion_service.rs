//! Entity deletion use-case service.
//!
//! # Responsibility
//! - Expose `delete_entity` and a read-only `plan_delete` preview.
//! - Run planning and execution inside one transaction boundary.
//!
//! # Invariants
//! - `delete_entity` takes SQLite's write lock before the first read
//!   (`BEGIN IMMEDIATE`), so the plan is computed and applied against one
//!   serialized snapshot.
//! - Every failure rolls the whole transaction back; nothing is partially
//!   committed.
//! - The borrowed connection must not already be inside a transaction.

use crate::deletion::plan::{DeleteAck, DeletionPlan};
use crate::deletion::{CascadeDeletePlanner, DeleteExecutor, DeleteResult, DeleteState};
use crate::model::entity::EntityId;
use crate::policy::LinkPolicySource;
use crate::repo::entity_repo::{ensure_connection_ready, RepoResult};
use crate::repo::entity_store::SqliteEntityStore;
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Deletion entry point bound to one connection and one policy source.
pub struct DeletionService<'conn, P: LinkPolicySource> {
    conn: &'conn Connection,
    policies: P,
}

impl<'conn, P: LinkPolicySource> DeletionService<'conn, P> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection, policies: P) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, policies })
    }

    /// Computes the plan for deleting `root` without changing anything.
    pub fn plan_delete(&self, root: EntityId) -> DeleteResult<DeletionPlan> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let plan = {
            let store = SqliteEntityStore::try_new(&tx)?;
            CascadeDeletePlanner::new(&store, &self.policies).plan(root)
        };
        tx.rollback()?;
        plan
    }

    /// Deletes `root` together with its cascade closure.
    ///
    /// # Errors
    /// - `NotFound` when `root` does not exist (including when it was
    ///   already deleted).
    /// - `ConcurrentModificationConflict` / `IntegrityViolation` when the
    ///   graph changed under the request; retry from scratch.
    pub fn delete_entity(&self, root: EntityId) -> DeleteResult<DeleteAck> {
        let started_at = Instant::now();
        info!(
            "event=entity_delete module=deletion status=start state={} root={}",
            DeleteState::Requested.as_str(),
            root
        );

        let outcome = self.plan_and_execute(root);
        self.log_outcome(root, &outcome, started_at);
        outcome
    }

    /// Applies a plan computed earlier, e.g. by [`Self::plan_delete`].
    ///
    /// Fails with a conflict when any planned entity changed since planning.
    pub fn apply_plan(&self, plan: &DeletionPlan) -> DeleteResult<DeleteAck> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = SqliteEntityStore::try_new(&tx)
            .map_err(Into::into)
            .and_then(|store| DeleteExecutor::new(&store).execute(plan));
        let outcome = match outcome {
            Ok(ack) => tx.commit().map(|()| ack).map_err(Into::into),
            Err(err) => Err(err),
        };
        self.log_outcome(plan.root(), &outcome, started_at);
        outcome
    }

    fn plan_and_execute(&self, root: EntityId) -> DeleteResult<DeleteAck> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let ack = {
            let store = SqliteEntityStore::try_new(&tx)?;
            let plan = CascadeDeletePlanner::new(&store, &self.policies).plan(root)?;
            debug!(
                "event=entity_delete module=deletion status=progress state={} root={} nodes={} preserved={}",
                DeleteState::Planned.as_str(),
                root,
                plan.nodes().len(),
                plan.preserved().len()
            );
            debug!(
                "event=entity_delete module=deletion status=progress state={} root={}",
                DeleteState::Executing.as_str(),
                root
            );
            DeleteExecutor::new(&store).execute(&plan)?
        };
        tx.commit()?;
        Ok(ack)
    }

    fn log_outcome(&self, root: EntityId, outcome: &DeleteResult<DeleteAck>, started_at: Instant) {
        match outcome {
            Ok(ack) => info!(
                "event=entity_delete module=deletion status=ok state={} root={} nodes={} broken_edges={} removed_edges={} children={} duration_ms={}",
                DeleteState::Committed.as_str(),
                root,
                ack.deleted_nodes.len(),
                ack.broken_edges.len(),
                ack.removed_edges.len(),
                ack.deleted_children,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=entity_delete module=deletion status=error state={} root={} duration_ms={} error_code={} error={}",
                DeleteState::Aborted.as_str(),
                root,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
    }
}
