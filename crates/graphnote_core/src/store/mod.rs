//! Row-store contract consumed by the sync layer.
//!
//! # Responsibility
//! - Describe the remote table operations the engine needs (`workspaces`,
//!   `nodes`, `links`), independent of any concrete backend.
//! - Ship two adapters: an in-process store and a SQLite store.
//!
//! # Invariants
//! - Every node/link operation carries the workspace id it is scoped to.
//! - `insert_node` returns the id assigned by the store.
//! - Adapters report missing rows as `StoreError::NotFound`, never as success.

use crate::db::DbError;
use crate::model::node::{Category, Link, Node, NodeId, Workspace, WorkspaceId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryRowStore, StoreOp, UpdateRecord};
pub use sqlite::SqliteRowStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by row-store adapters.
#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable or request failed in transit.
    Unavailable(String),
    /// Targeted row does not exist in the given scope.
    NotFound { table: &'static str, key: String },
    /// Backend refused the write (constraint, permission, ...).
    Rejected(String),
    /// Local SQLite adapter failure.
    Db(DbError),
    /// A stored row cannot be decoded.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "row store unavailable: {message}"),
            Self::NotFound { table, key } => write!(f, "{table} row not found: {key}"),
            Self::Rejected(message) => write!(f, "row store rejected write: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored row: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Insert payload for the `nodes` table. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNodeRow {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub category: Category,
}

/// Partial update for one `nodes` row. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePatch {
    pub content: Option<String>,
    pub category: Option<Category>,
}

impl NodePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            category: None,
        }
    }

    pub fn category(category: Category) -> Self {
        Self {
            content: None,
            category: Some(category),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.category.is_none()
    }
}

/// Remote table operations required by the engine.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Looks a workspace up by its display name.
    async fn find_workspace(&self, name: &str) -> StoreResult<Option<Workspace>>;
    async fn list_workspaces(&self) -> StoreResult<Vec<Workspace>>;
    /// Lists nodes of one workspace in store order.
    async fn select_nodes(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Node>>;
    async fn select_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<Option<Node>>;
    /// Lists links of one workspace in store order.
    async fn select_links(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Link>>;
    /// Inserts a node and returns the stored row, including its new id.
    async fn insert_node(&self, row: NewNodeRow) -> StoreResult<Node>;
    async fn update_node(&self, workspace_id: WorkspaceId, id: NodeId, patch: NodePatch) -> StoreResult<()>;
    async fn delete_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<()>;
    async fn insert_link(&self, link: Link) -> StoreResult<Link>;
    /// Deletes every link whose source or target is `id`; returns the count.
    async fn delete_links_touching(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<usize>;
}
