//! Translator between the graph model and the row store.
//!
//! # Responsibility
//! - Turn workspace loads into whole-graph replacements.
//! - Turn local mutations into scoped remote writes.
//!
//! # Invariants
//! - Holds no graph data; the only state is the load-request counter.
//! - A fetched graph is installed only if its ticket is the latest issued.
//! - Cascade deletes remove links before the node.

use crate::graph::model::{GraphModel, ModelError};
use crate::model::node::{
    Category, Link, Node, NodeDraft, NodeId, ValidationError, Workspace, WorkspaceId,
};
use crate::store::{NewNodeRow, NodePatch, RowStore, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Errors from sync operations.
#[derive(Debug)]
pub enum SyncError {
    /// Local input rejected; no remote call was made.
    Validation(ModelError),
    /// A remote read or write failed.
    Store {
        op: &'static str,
        source: StoreError,
    },
    /// No workspace with this name exists in the store.
    WorkspaceNotFound(String),
    /// The store has no such node in the workspace.
    NodeNotFound(NodeId),
    /// The link step of a cascade delete ran but the node delete failed.
    /// Local state must be reloaded instead of trusted.
    PartialCascadeFailure {
        node: NodeId,
        links_removed: usize,
        source: StoreError,
    },
}

impl SyncError {
    fn store(op: &'static str) -> impl FnOnce(StoreError) -> SyncError {
        move |source| SyncError::Store { op, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// True when local state may have diverged from the store.
    pub fn needs_reload(&self) -> bool {
        matches!(self, Self::PartialCascadeFailure { .. })
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store { op, source } => write!(f, "{op} failed: {source}"),
            Self::WorkspaceNotFound(name) => write!(f, "workspace not found: {name}"),
            Self::NodeNotFound(id) => write!(f, "node not found in store: {id}"),
            Self::PartialCascadeFailure {
                node,
                links_removed,
                source,
            } => write!(
                f,
                "removed {links_removed} links of node {node} but node delete failed: {source}"
            ),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::PartialCascadeFailure { source, .. } => Some(source),
            Self::WorkspaceNotFound(_) | Self::NodeNotFound(_) => None,
        }
    }
}

impl From<ModelError> for SyncError {
    fn from(value: ModelError) -> Self {
        Self::Validation(value)
    }
}

impl From<ValidationError> for SyncError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.into())
    }
}

/// Identifies one issued workspace load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub workspace_id: WorkspaceId,
    pub token: u64,
}

/// Result of both workspace reads, not yet installed.
#[derive(Debug)]
pub struct FetchedGraph {
    pub ticket: LoadTicket,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { nodes: usize, links: usize },
    /// A newer load was issued; this result was discarded.
    Superseded { token: u64, latest: u64 },
}

/// Outcome of a successful cascade delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub node: NodeId,
    pub links_removed: usize,
}

pub struct SyncController<S: RowStore> {
    store: Arc<S>,
    load_seq: AtomicU64,
}

impl<S: RowStore> SyncController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            load_seq: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn resolve_workspace(&self, name: &str) -> Result<Workspace, SyncError> {
        self.store
            .find_workspace(name)
            .await
            .map_err(SyncError::store("find_workspace"))?
            .ok_or_else(|| SyncError::WorkspaceNotFound(name.to_string()))
    }

    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, SyncError> {
        self.store
            .list_workspaces()
            .await
            .map_err(SyncError::store("list_workspaces"))
    }

    /// Issues a new load. Every earlier ticket becomes stale.
    pub fn begin_load(&self, workspace_id: WorkspaceId) -> LoadTicket {
        let token = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "event=workspace_load module=sync status=start workspace={workspace_id} token={token}"
        );
        LoadTicket {
            workspace_id,
            token,
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.load_seq.load(Ordering::SeqCst) == ticket.token
    }

    /// Runs both reads. Either failing fails the whole fetch.
    pub async fn fetch(&self, ticket: LoadTicket) -> Result<FetchedGraph, SyncError> {
        let (nodes, links) = tokio::join!(
            self.store.select_nodes(ticket.workspace_id),
            self.store.select_links(ticket.workspace_id)
        );
        let nodes = nodes.map_err(SyncError::store("select_nodes"))?;
        let links = links.map_err(SyncError::store("select_links"))?;
        Ok(FetchedGraph {
            ticket,
            nodes,
            links,
        })
    }

    /// Installs `fetched` unless a newer load has been issued since.
    pub fn apply(&self, model: &mut GraphModel, fetched: FetchedGraph) -> LoadOutcome {
        let latest = self.load_seq.load(Ordering::SeqCst);
        if fetched.ticket.token != latest {
            info!(
                "event=workspace_load module=sync status=superseded workspace={} token={} latest={}",
                fetched.ticket.workspace_id, fetched.ticket.token, latest
            );
            return LoadOutcome::Superseded {
                token: fetched.ticket.token,
                latest,
            };
        }
        model.replace_all(fetched.nodes, fetched.links);
        info!(
            "event=workspace_load module=sync status=ok workspace={} token={} nodes={} links={}",
            fetched.ticket.workspace_id,
            fetched.ticket.token,
            model.node_count(),
            model.link_count()
        );
        LoadOutcome::Applied {
            nodes: model.node_count(),
            links: model.link_count(),
        }
    }

    /// Loads `workspace_id` into `model`, replacing it wholesale.
    ///
    /// On failure the model is untouched. A failure of a load that has been
    /// superseded in the meantime is reported as `Superseded`.
    pub async fn load_workspace(
        &self,
        model: &mut GraphModel,
        workspace_id: WorkspaceId,
    ) -> Result<LoadOutcome, SyncError> {
        let started_at = Instant::now();
        let ticket = self.begin_load(workspace_id);
        match self.fetch(ticket).await {
            Ok(fetched) => Ok(self.apply(model, fetched)),
            Err(_) if !self.is_current(&ticket) => Ok(LoadOutcome::Superseded {
                token: ticket.token,
                latest: self.load_seq.load(Ordering::SeqCst),
            }),
            Err(err) => {
                warn!(
                    "event=workspace_load module=sync status=error workspace={} duration_ms={} error={}",
                    workspace_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Re-reads one node; used when the editor opens.
    pub async fn fetch_node(&self, workspace_id: WorkspaceId, id: NodeId) -> Result<Node, SyncError> {
        self.store
            .select_node(workspace_id, id)
            .await
            .map_err(SyncError::store("select_node"))?
            .ok_or(SyncError::NodeNotFound(id))
    }

    /// Validates and inserts a draft; the returned node carries the store id.
    pub async fn persist_new_node(
        &self,
        draft: &NodeDraft,
        workspace_id: WorkspaceId,
    ) -> Result<Node, SyncError> {
        let draft = draft.normalized()?;
        let category = draft.category_or_default();
        let node = self
            .store
            .insert_node(NewNodeRow {
                workspace_id,
                name: draft.name,
                category,
            })
            .await
            .map_err(SyncError::store("insert_node"))?;
        info!(
            "event=node_create module=sync status=ok workspace={} node={}",
            workspace_id, node.id
        );
        Ok(node)
    }

    /// Writes note content. The caller keeps its in-memory copy either way.
    pub async fn persist_content_update(
        &self,
        workspace_id: WorkspaceId,
        id: NodeId,
        content: &str,
    ) -> Result<(), SyncError> {
        self.store
            .update_node(workspace_id, id, NodePatch::content(content))
            .await
            .map_err(SyncError::store("update_node"))?;
        debug!(
            "event=content_save module=sync status=ok workspace={} node={} content_len={}",
            workspace_id,
            id,
            content.len()
        );
        Ok(())
    }

    pub async fn persist_category_update(
        &self,
        workspace_id: WorkspaceId,
        id: NodeId,
        category: &Category,
    ) -> Result<(), SyncError> {
        self.store
            .update_node(workspace_id, id, NodePatch::category(category.clone()))
            .await
            .map_err(SyncError::store("update_node"))
    }

    pub async fn persist_link(
        &self,
        source: NodeId,
        target: NodeId,
        workspace_id: WorkspaceId,
    ) -> Result<Link, SyncError> {
        if source == target {
            return Err(ValidationError::SelfLink(source).into());
        }
        let link = self
            .store
            .insert_link(Link {
                source,
                target,
                workspace_id,
            })
            .await
            .map_err(SyncError::store("insert_link"))?;
        info!(
            "event=link_create module=sync status=ok workspace={} source={} target={}",
            workspace_id, source, target
        );
        Ok(link)
    }

    /// Deletes the node's links, then the node.
    pub async fn delete_node_cascade(
        &self,
        workspace_id: WorkspaceId,
        id: NodeId,
    ) -> Result<CascadeReport, SyncError> {
        let links_removed = self
            .store
            .delete_links_touching(workspace_id, id)
            .await
            .map_err(SyncError::store("delete_links"))?;

        match self.store.delete_node(workspace_id, id).await {
            Ok(()) => {
                info!(
                    "event=node_delete module=sync status=ok workspace={} node={} links_removed={}",
                    workspace_id, id, links_removed
                );
                Ok(CascadeReport {
                    node: id,
                    links_removed,
                })
            }
            Err(source) => {
                warn!(
                    "event=node_delete module=sync status=partial workspace={} node={} links_removed={} error={}",
                    workspace_id, id, links_removed, source
                );
                Err(SyncError::PartialCascadeFailure {
                    node: id,
                    links_removed,
                    source,
                })
            }
        }
    }
}
