//! Deletion plan and execution acknowledgement.

use crate::model::composition::ChildRef;
use crate::model::entity::EntityId;
use crate::model::link::{Link, LinkId};
use crate::repo::entity_store::EntityNode;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Immutable result of one planning pass.
///
/// A plan is a pure value: it holds ids, versions and link records read from
/// one consistent store snapshot, and no handle into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionPlan {
    root: EntityId,
    /// Planned entities in discovery order, root first.
    nodes: Vec<EntityNode>,
    /// Top-level composition children of every planned entity.
    children: Vec<ChildRef>,
    /// Links removed while at least one endpoint survives.
    edges_to_break: BTreeMap<LinkId, Link>,
    /// Links with both endpoints planned.
    internal_edges: BTreeMap<LinkId, Link>,
    /// Cascade targets kept alive by an external reference.
    preserved: BTreeSet<EntityId>,
}

impl DeletionPlan {
    pub(super) fn new(root: EntityNode) -> Self {
        Self {
            root: root.id,
            nodes: vec![root],
            children: Vec::new(),
            edges_to_break: BTreeMap::new(),
            internal_edges: BTreeMap::new(),
            preserved: BTreeSet::new(),
        }
    }

    pub(super) fn push_node(&mut self, node: EntityNode) -> usize {
        self.preserved.remove(&node.id);
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(super) fn node_at(&self, index: usize) -> &EntityNode {
        &self.nodes[index]
    }

    pub(super) fn extend_children(&mut self, children: impl IntoIterator<Item = ChildRef>) {
        self.children.extend(children);
    }

    pub(super) fn break_edge(&mut self, link: Link) {
        self.edges_to_break.insert(link.id, link);
    }

    pub(super) fn cascade_edge(&mut self, link: Link) {
        self.internal_edges.insert(link.id, link);
    }

    pub(super) fn preserve(&mut self, id: EntityId) {
        self.preserved.insert(id);
    }

    /// Moves links whose endpoints both ended up planned out of the break
    /// set. Run once, after the closure is final.
    pub(super) fn settle_edges(&mut self) {
        let planned = self.node_ids();
        let (internal, crossing): (BTreeMap<LinkId, Link>, BTreeMap<LinkId, Link>) =
            std::mem::take(&mut self.edges_to_break)
                .into_iter()
                .partition(|(_, link)| {
                    planned.contains(&link.source_id) && planned.contains(&link.target_id)
                });
        self.internal_edges.extend(internal);
        self.edges_to_break = crossing;
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn nodes(&self) -> &[EntityNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> BTreeSet<EntityId> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    pub fn contains_node(&self, id: &EntityId) -> bool {
        self.nodes.iter().any(|node| node.id == *id)
    }

    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    pub fn edges_to_break(&self) -> impl Iterator<Item = &Link> {
        self.edges_to_break.values()
    }

    pub fn internal_edges(&self) -> impl Iterator<Item = &Link> {
        self.internal_edges.values()
    }

    pub fn breaks_edge(&self, id: &LinkId) -> bool {
        self.edges_to_break.contains_key(id)
    }

    /// Cascade targets that survive because something outside the closure
    /// still links to them.
    pub fn preserved(&self) -> &BTreeSet<EntityId> {
        &self.preserved
    }

    /// All link ids the plan removes.
    pub fn edge_ids(&self) -> Vec<LinkId> {
        self.edges_to_break
            .keys()
            .chain(self.internal_edges.keys())
            .copied()
            .collect()
    }
}

/// Acknowledgement of a committed deletion.
///
/// Callers use it to retract deleted entities from secondary indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub root: EntityId,
    pub deleted_nodes: Vec<EntityId>,
    pub broken_edges: Vec<LinkId>,
    pub removed_edges: Vec<LinkId>,
    /// Composition rows removed, nested rows included.
    pub deleted_children: usize,
}
