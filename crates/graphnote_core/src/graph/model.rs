//! Copy-on-write graph model.
//!
//! Mutations go through `Arc::make_mut`, so a renderer that still holds an
//! older `Arc<GraphSnapshot>` keeps seeing that complete version.

use crate::model::node::{Category, Link, Node, NodeDraft, NodeId, ValidationError};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from graph model operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Local input rejected before any remote call.
    Validation(ValidationError),
    /// Target node is not in the current graph.
    NodeNotFound(NodeId),
    /// A node with the same store id is already present.
    DuplicateNode(NodeId),
}

impl ModelError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::DuplicateNode(id) => write!(f, "node already present: {id}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NodeNotFound(_) => None,
            Self::DuplicateNode(_) => None,
        }
    }
}

impl From<ValidationError> for ModelError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Immutable view handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    /// Insertion order: store order on load, then confirmation order.
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl GraphSnapshot {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Entries dropped by [`GraphModel::remove_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    pub node: Node,
    pub links: Vec<Link>,
}

/// Single owner of the active workspace's nodes and links.
#[derive(Debug, Default)]
pub struct GraphModel {
    snapshot: Arc<GraphSnapshot>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap to clone and safe to keep across mutations.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.snapshot.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.snapshot.links
    }

    pub fn node_count(&self) -> usize {
        self.snapshot.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.snapshot.links.len()
    }

    /// Discards the current graph and installs `nodes`/`links` in one swap.
    ///
    /// Links whose endpoints are missing from `nodes` are dropped; returns how
    /// many were dropped.
    pub fn replace_all(&mut self, nodes: Vec<Node>, links: Vec<Link>) -> usize {
        let known: HashSet<NodeId> = nodes.iter().map(|node| node.id).collect();
        let total_links = links.len();
        let links: Vec<Link> = links
            .into_iter()
            .filter(|link| known.contains(&link.source) && known.contains(&link.target))
            .collect();
        let dropped = total_links - links.len();
        if dropped > 0 {
            warn!(
                "event=graph_replace module=graph status=warn dangling_links_dropped={}",
                dropped
            );
        }

        self.snapshot = Arc::new(GraphSnapshot { nodes, links });
        debug!(
            "event=graph_replace module=graph status=ok nodes={} links={}",
            self.node_count(),
            self.link_count()
        );
        dropped
    }

    pub fn clear(&mut self) {
        self.snapshot = Arc::new(GraphSnapshot::default());
    }

    /// Validates a draft for `add_node`. The model never assigns ids, so a
    /// draft only becomes a node after the store confirms it.
    pub fn validate_draft(&self, draft: &NodeDraft) -> Result<NodeDraft, ModelError> {
        draft.normalized().map_err(Into::into)
    }

    /// Inserts a store-confirmed node.
    pub fn add_node(&mut self, node: Node) -> Result<&Node, ModelError> {
        node.validate()?;
        if self.find_by_id(node.id).is_some() {
            return Err(ModelError::DuplicateNode(node.id));
        }
        let nodes = &mut Arc::make_mut(&mut self.snapshot).nodes;
        nodes.push(node);
        Ok(&nodes[nodes.len() - 1])
    }

    /// Removes a node and every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<RemovedNode> {
        let position = self.snapshot.nodes.iter().position(|node| node.id == id)?;
        let snapshot = Arc::make_mut(&mut self.snapshot);
        let node = snapshot.nodes.remove(position);
        let (removed_links, kept): (Vec<Link>, Vec<Link>) = std::mem::take(&mut snapshot.links)
            .into_iter()
            .partition(|link| link.touches(id));
        snapshot.links = kept;
        Some(RemovedNode {
            node,
            links: removed_links,
        })
    }

    /// Checks `add_link` rules without mutating.
    ///
    /// Self-links are reported before endpoint lookups, so `(a, a)` is always
    /// `SelfLink` whether or not `a` exists.
    pub fn check_link(&self, source: NodeId, target: NodeId) -> Result<(), ModelError> {
        if source == target {
            return Err(ValidationError::SelfLink(source).into());
        }
        if self.find_by_id(source).is_none() {
            return Err(ValidationError::InvalidEndpoint(source).into());
        }
        if self.find_by_id(target).is_none() {
            return Err(ValidationError::InvalidEndpoint(target).into());
        }
        if self
            .snapshot
            .links
            .iter()
            .any(|link| link.same_pair(source, target))
        {
            return Err(ValidationError::DuplicateLink { source, target }.into());
        }
        Ok(())
    }

    /// Inserts a link after checking endpoints, self-links and duplicates.
    pub fn add_link(&mut self, link: Link) -> Result<&Link, ModelError> {
        self.check_link(link.source, link.target)?;
        let links = &mut Arc::make_mut(&mut self.snapshot).links;
        links.push(link);
        Ok(&links[links.len() - 1])
    }

    pub fn find_by_id(&self, id: NodeId) -> Option<&Node> {
        self.snapshot.node(id)
    }

    /// Case-insensitive name filter, evaluated lazily on every call.
    pub fn find_by_name_substring<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Node> + 'a {
        let needle = query.to_lowercase();
        self.snapshot
            .nodes
            .iter()
            .filter(move |node| node.name.to_lowercase().contains(needle.as_str()))
    }

    pub fn links_of(&self, id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.snapshot.links.iter().filter(move |link| link.touches(id))
    }

    pub fn set_category(&mut self, id: NodeId, category: Category) -> Result<(), ModelError> {
        self.node_mut(id)?.category = category;
        Ok(())
    }

    pub fn update_content(&mut self, id: NodeId, content: impl Into<String>) -> Result<(), ModelError> {
        self.node_mut(id)?.content = content.into();
        Ok(())
    }

    /// Overwrites the in-memory copy with a fresher store copy.
    pub fn refresh_node(&mut self, fresh: Node) -> Result<(), ModelError> {
        let id = fresh.id;
        *self.node_mut(id)? = fresh;
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ModelError> {
        if self.find_by_id(id).is_none() {
            return Err(ModelError::NodeNotFound(id));
        }
        Arc::make_mut(&mut self.snapshot)
            .nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or(ModelError::NodeNotFound(id))
    }
}
