//! In-process row store.
//!
//! Keeps the three tables in `tokio::sync::RwLock`-guarded collections.
//! Used by tests and demos; supports per-operation failure injection and
//! per-workspace read latency so sync ordering can be exercised.

use super::{NewNodeRow, NodePatch, RowStore, StoreError, StoreResult};
use crate::model::node::{Category, Link, Node, NodeId, Workspace, WorkspaceId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

/// Row-store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindWorkspace,
    ListWorkspaces,
    SelectNodes,
    SelectNode,
    SelectLinks,
    InsertNode,
    UpdateNode,
    DeleteNode,
    InsertLink,
    DeleteLinks,
}

#[derive(Debug, Default)]
struct Tables {
    workspaces: Vec<Workspace>,
    nodes: Vec<Node>,
    links: Vec<Link>,
    next_node_id: i64,
}

/// Recorded `update_node` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub workspace_id: WorkspaceId,
    pub id: NodeId,
    pub patch: NodePatch,
}

#[derive(Debug, Default)]
pub struct MemoryRowStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<StoreOp>>,
    read_delays: RwLock<HashMap<WorkspaceId, Duration>>,
    updates: RwLock<Vec<UpdateRecord>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_workspace(&self, name: &str) -> Workspace {
        let workspace = Workspace {
            id: WorkspaceId::generate(),
            name: name.to_string(),
        };
        self.tables.write().await.workspaces.push(workspace.clone());
        workspace
    }

    /// Inserts a node row directly, bypassing failure injection.
    pub async fn seed_node(&self, workspace_id: WorkspaceId, name: &str, content: &str) -> Node {
        let mut tables = self.tables.write().await;
        let node = Node {
            id: next_id(&mut tables),
            name: name.to_string(),
            content: content.to_string(),
            category: Category::General,
            workspace_id,
        };
        tables.nodes.push(node.clone());
        node
    }

    /// Inserts a link row directly, bypassing failure injection.
    pub async fn seed_link(&self, workspace_id: WorkspaceId, source: NodeId, target: NodeId) -> Link {
        let link = Link {
            source,
            target,
            workspace_id,
        };
        self.tables.write().await.links.push(link.clone());
        link
    }

    /// Makes every subsequent call of `op` fail until cleared.
    pub async fn fail_on(&self, op: StoreOp) {
        self.failing.write().await.insert(op);
    }

    pub async fn clear_failure(&self, op: StoreOp) {
        self.failing.write().await.remove(&op);
    }

    /// Delays node/link selects for one workspace.
    pub async fn set_read_delay(&self, workspace_id: WorkspaceId, delay: Duration) {
        self.read_delays.write().await.insert(workspace_id, delay);
    }

    /// Every successful `update_node` call, in order.
    pub async fn updates(&self) -> Vec<UpdateRecord> {
        self.updates.read().await.clone()
    }

    /// Raw row, ignoring workspace scope. Test inspection only.
    pub async fn stored_node(&self, id: NodeId) -> Option<Node> {
        self.tables
            .read()
            .await
            .nodes
            .iter()
            .find(|node| node.id == id)
            .cloned()
    }

    pub async fn stored_links(&self) -> Vec<Link> {
        self.tables.read().await.links.clone()
    }

    async fn guard(&self, op: StoreOp) -> StoreResult<()> {
        if self.failing.read().await.contains(&op) {
            return Err(StoreError::Unavailable(format!("injected failure: {op:?}")));
        }
        Ok(())
    }

    async fn read_delay(&self, workspace_id: WorkspaceId) {
        let delay = self.read_delays.read().await.get(&workspace_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn next_id(tables: &mut Tables) -> NodeId {
    tables.next_node_id += 1;
    NodeId(tables.next_node_id)
}

fn not_found(table: &'static str, id: NodeId) -> StoreError {
    StoreError::NotFound {
        table,
        key: id.to_string(),
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn find_workspace(&self, name: &str) -> StoreResult<Option<Workspace>> {
        self.guard(StoreOp::FindWorkspace).await?;
        Ok(self
            .tables
            .read()
            .await
            .workspaces
            .iter()
            .find(|workspace| workspace.name == name)
            .cloned())
    }

    async fn list_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        self.guard(StoreOp::ListWorkspaces).await?;
        Ok(self.tables.read().await.workspaces.clone())
    }

    async fn select_nodes(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Node>> {
        self.read_delay(workspace_id).await;
        self.guard(StoreOp::SelectNodes).await?;
        Ok(self
            .tables
            .read()
            .await
            .nodes
            .iter()
            .filter(|node| node.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn select_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<Option<Node>> {
        self.guard(StoreOp::SelectNode).await?;
        Ok(self
            .tables
            .read()
            .await
            .nodes
            .iter()
            .find(|node| node.id == id && node.workspace_id == workspace_id)
            .cloned())
    }

    async fn select_links(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Link>> {
        self.read_delay(workspace_id).await;
        self.guard(StoreOp::SelectLinks).await?;
        Ok(self
            .tables
            .read()
            .await
            .links
            .iter()
            .filter(|link| link.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn insert_node(&self, row: NewNodeRow) -> StoreResult<Node> {
        self.guard(StoreOp::InsertNode).await?;
        let mut tables = self.tables.write().await;
        if !tables.workspaces.iter().any(|ws| ws.id == row.workspace_id) {
            return Err(StoreError::Rejected(format!(
                "unknown workspace {}",
                row.workspace_id
            )));
        }
        let node = Node {
            id: next_id(&mut tables),
            name: row.name,
            content: String::new(),
            category: row.category,
            workspace_id: row.workspace_id,
        };
        tables.nodes.push(node.clone());
        Ok(node)
    }

    async fn update_node(&self, workspace_id: WorkspaceId, id: NodeId, patch: NodePatch) -> StoreResult<()> {
        self.guard(StoreOp::UpdateNode).await?;
        {
            let mut tables = self.tables.write().await;
            let node = tables
                .nodes
                .iter_mut()
                .find(|node| node.id == id && node.workspace_id == workspace_id)
                .ok_or_else(|| not_found("nodes", id))?;
            if let Some(content) = &patch.content {
                node.content = content.clone();
            }
            if let Some(category) = &patch.category {
                node.category = category.clone();
            }
        }
        self.updates.write().await.push(UpdateRecord {
            workspace_id,
            id,
            patch,
        });
        Ok(())
    }

    async fn delete_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<()> {
        self.guard(StoreOp::DeleteNode).await?;
        let mut tables = self.tables.write().await;
        if tables
            .links
            .iter()
            .any(|link| link.workspace_id == workspace_id && link.touches(id))
        {
            return Err(StoreError::Rejected(format!(
                "node {id} is still referenced by links"
            )));
        }
        let before = tables.nodes.len();
        tables
            .nodes
            .retain(|node| !(node.id == id && node.workspace_id == workspace_id));
        if tables.nodes.len() == before {
            return Err(not_found("nodes", id));
        }
        Ok(())
    }

    async fn insert_link(&self, link: Link) -> StoreResult<Link> {
        self.guard(StoreOp::InsertLink).await?;
        let mut tables = self.tables.write().await;
        for endpoint in [link.source, link.target] {
            if !tables
                .nodes
                .iter()
                .any(|node| node.id == endpoint && node.workspace_id == link.workspace_id)
            {
                return Err(StoreError::Rejected(format!(
                    "link endpoint {endpoint} not in workspace {}",
                    link.workspace_id
                )));
            }
        }
        tables.links.push(link.clone());
        Ok(link)
    }

    async fn delete_links_touching(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<usize> {
        self.guard(StoreOp::DeleteLinks).await?;
        let mut tables = self.tables.write().await;
        let before = tables.links.len();
        tables
            .links
            .retain(|link| !(link.workspace_id == workspace_id && link.touches(id)));
        Ok(before - tables.links.len())
    }
}
