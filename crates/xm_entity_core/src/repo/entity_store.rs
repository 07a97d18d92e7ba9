//! Deletion-facing view of the entity store.
//!
//! # Responsibility
//! - Expose the narrow read/delete surface the deletion engine consumes.
//! - Enforce optimistic version checks on node removal.
//!
//! # Invariants
//! - All calls run on the caller's connection or transaction; the store
//!   never opens or commits a transaction of its own.
//! - Deletes report missing rows as errors instead of silently succeeding.

use crate::model::composition::{ChildRef, CompositionKind};
use crate::model::entity::EntityId;
use crate::model::link::{Link, LinkId};
use crate::repo::entity_repo::{
    child_table, current_version, ensure_connection_ready, parse_uuid, query_links, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeSet;

/// Snapshot of the node fields the deletion engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNode {
    pub id: EntityId,
    pub type_key: String,
    /// Version observed when the snapshot was taken.
    pub version: i64,
}

/// Store operations used while planning and executing a delete.
pub trait EntityStore {
    fn get_node(&self, id: EntityId) -> RepoResult<Option<EntityNode>>;
    /// Lists top-level composition children owned by `id`.
    fn list_composition_children(&self, id: EntityId) -> RepoResult<Vec<ChildRef>>;
    fn list_outgoing_edges(&self, id: EntityId) -> RepoResult<Vec<Link>>;
    /// Lists links targeting `id` whose source is not in `excluding`.
    fn list_incoming_edges(
        &self,
        id: EntityId,
        excluding: &BTreeSet<EntityId>,
    ) -> RepoResult<Vec<Link>>;
    fn delete_edges(&self, ids: &[LinkId]) -> RepoResult<()>;
    /// Deletes children and their nested rows; returns removed row count.
    fn delete_composition_children(&self, children: &[ChildRef]) -> RepoResult<usize>;
    /// Deletes nodes whose stored version still equals the snapshot version.
    fn delete_nodes(&self, nodes: &[EntityNode]) -> RepoResult<()>;
}

/// SQLite-backed [`EntityStore`].
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Creates store from a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn get_node(&self, id: EntityId) -> RepoResult<Option<EntityNode>> {
        let row = self
            .conn
            .query_row(
                "SELECT type_key, version FROM xm_entity WHERE id = ?1;",
                [id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(type_key, version)| EntityNode {
            id,
            type_key,
            version,
        }))
    }

    fn list_composition_children(&self, id: EntityId) -> RepoResult<Vec<ChildRef>> {
        let mut children = Vec::new();
        for kind in CompositionKind::ALL {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT id FROM {} WHERE xm_entity_id = ?1 ORDER BY id ASC;",
                child_table(kind)
            ))?;
            let mut rows = stmt.query([id.to_string()])?;
            while let Some(row) = rows.next()? {
                let value: String = row.get(0)?;
                children.push(ChildRef {
                    kind,
                    id: parse_uuid(&value, "composition.id")?,
                    owner_id: id,
                });
            }
        }
        Ok(children)
    }

    fn list_outgoing_edges(&self, id: EntityId) -> RepoResult<Vec<Link>> {
        query_links(self.conn, "source_id", id)
    }

    fn list_incoming_edges(
        &self,
        id: EntityId,
        excluding: &BTreeSet<EntityId>,
    ) -> RepoResult<Vec<Link>> {
        let mut links = query_links(self.conn, "target_id", id)?;
        links.retain(|link| !excluding.contains(&link.source_id));
        Ok(links)
    }

    fn delete_edges(&self, ids: &[LinkId]) -> RepoResult<()> {
        let mut stmt = self.conn.prepare("DELETE FROM link WHERE id = ?1;")?;
        for id in ids {
            if stmt.execute([id.to_string()])? == 0 {
                return Err(RepoError::LinkNotFound(*id));
            }
        }
        Ok(())
    }

    fn delete_composition_children(&self, children: &[ChildRef]) -> RepoResult<usize> {
        let mut removed = 0;
        for child in children {
            let id_text = child.id.to_string();
            removed += match child.kind {
                CompositionKind::Calendar => self.conn.execute(
                    "DELETE FROM calendar_event WHERE calendar_id = ?1;",
                    [id_text.as_str()],
                )?,
                CompositionKind::Rating => self
                    .conn
                    .execute("DELETE FROM vote WHERE rating_id = ?1;", [id_text.as_str()])?,
                _ => 0,
            };

            let changed = self.conn.execute(
                &format!(
                    "DELETE FROM {} WHERE id = ?1 AND xm_entity_id = ?2;",
                    child_table(child.kind)
                ),
                params![id_text, child.owner_id.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::ChildNotFound(*child));
            }
            removed += changed;
        }
        Ok(removed)
    }

    fn delete_nodes(&self, nodes: &[EntityNode]) -> RepoResult<()> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM xm_entity WHERE id = ?1 AND version = ?2;")?;
        for node in nodes {
            if stmt.execute(params![node.id.to_string(), node.version])? == 0 {
                return Err(RepoError::VersionConflict {
                    id: node.id,
                    expected: node.version,
                    actual: current_version(self.conn, node.id)?,
                });
            }
        }
        Ok(())
    }
}
