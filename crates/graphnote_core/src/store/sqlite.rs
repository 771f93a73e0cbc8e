//! SQLite-backed row store.
//!
//! # Responsibility
//! - Serve the `RowStore` contract from a migrated local database.
//! - Keep SQL text and row decoding inside this adapter.
//!
//! # Invariants
//! - Every node/link statement filters on `workspace_id`.
//! - Node ids come from SQLite `AUTOINCREMENT`.

use super::{NewNodeRow, NodePatch, RowStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use crate::model::node::{Category, Link, Node, NodeId, Workspace, WorkspaceId};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const NODE_SELECT_SQL: &str = "SELECT id, name, content, category, workspace_id FROM nodes";

/// Row store over one SQLite connection.
///
/// Statements are short and run to completion under the lock; no guard is
/// held across an await point.
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Returns the workspace named `name`, creating it when missing.
    pub fn ensure_workspace(&self, name: &str) -> StoreResult<Workspace> {
        let conn = self.lock()?;
        if let Some(existing) = find_workspace(&conn, name)? {
            return Ok(existing);
        }
        let workspace = Workspace {
            id: WorkspaceId::generate(),
            name: name.trim().to_string(),
        };
        conn.execute(
            "INSERT INTO workspaces (id, name) VALUES (?1, ?2);",
            params![workspace.id.to_string(), workspace.name],
        )?;
        Ok(workspace)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn find_workspace(conn: &Connection, name: &str) -> StoreResult<Option<Workspace>> {
    conn.query_row(
        "SELECT id, name FROM workspaces WHERE name = ?1;",
        [name.trim()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()?
    .map(|(id, name)| {
        Ok(Workspace {
            id: parse_workspace_id(&id)?,
            name,
        })
    })
    .transpose()
}

fn parse_workspace_id(value: &str) -> StoreResult<WorkspaceId> {
    Uuid::parse_str(value)
        .map(WorkspaceId)
        .map_err(|_| StoreError::InvalidData(format!("invalid workspace id `{value}`")))
}

fn parse_node_row(row: &Row<'_>) -> StoreResult<Node> {
    let workspace_text: String = row.get("workspace_id")?;
    let category_text: Option<String> = row.get("category")?;
    let content: Option<String> = row.get("content")?;
    let node = Node {
        id: NodeId(row.get("id")?),
        name: row.get("name")?,
        content: content.unwrap_or_default(),
        category: category_text.map_or(Category::General, |label| Category::parse(&label)),
        workspace_id: parse_workspace_id(&workspace_text)?,
    };
    node.validate()
        .map_err(|err| StoreError::InvalidData(format!("node {}: {err}", node.id)))?;
    Ok(node)
}

fn parse_link_row(row: &Row<'_>) -> StoreResult<Link> {
    let workspace_text: String = row.get("workspace_id")?;
    Ok(Link {
        source: NodeId(row.get("source")?),
        target: NodeId(row.get("target")?),
        workspace_id: parse_workspace_id(&workspace_text)?,
    })
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn find_workspace(&self, name: &str) -> StoreResult<Option<Workspace>> {
        find_workspace(&*self.lock()?, name)
    }

    async fn list_workspaces(&self) -> StoreResult<Vec<Workspace>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM workspaces ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut workspaces = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            workspaces.push(Workspace {
                id: parse_workspace_id(&id)?,
                name: row.get(1)?,
            });
        }
        Ok(workspaces)
    }

    async fn select_nodes(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Node>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{NODE_SELECT_SQL} WHERE workspace_id = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([workspace_id.to_string()])?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    async fn select_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<Option<Node>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{NODE_SELECT_SQL} WHERE workspace_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![workspace_id.to_string(), id.0])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_node_row(row)?)),
            None => Ok(None),
        }
    }

    async fn select_links(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Link>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, target, workspace_id
             FROM links
             WHERE workspace_id = ?1
             ORDER BY link_id ASC;",
        )?;
        let mut rows = stmt.query([workspace_id.to_string()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(row)?);
        }
        Ok(links)
    }

    async fn insert_node(&self, row: NewNodeRow) -> StoreResult<Node> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO nodes (name, content, category, workspace_id) VALUES (?1, '', ?2, ?3);",
            params![
                row.name,
                row.category.as_str(),
                row.workspace_id.to_string()
            ],
        )?;
        Ok(Node {
            id: NodeId(conn.last_insert_rowid()),
            name: row.name,
            content: String::new(),
            category: row.category,
            workspace_id: row.workspace_id,
        })
    }

    async fn update_node(&self, workspace_id: WorkspaceId, id: NodeId, patch: NodePatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE nodes
             SET
                content = COALESCE(?1, content),
                category = COALESCE(?2, category)
             WHERE workspace_id = ?3 AND id = ?4;",
            params![
                patch.content,
                patch.category.as_ref().map(Category::as_str),
                workspace_id.to_string(),
                id.0
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: "nodes",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_node(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM nodes WHERE workspace_id = ?1 AND id = ?2;",
            params![workspace_id.to_string(), id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: "nodes",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_link(&self, link: Link) -> StoreResult<Link> {
        let conn = self.lock()?;
        let endpoints_in_scope: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE workspace_id = ?1 AND id IN (?2, ?3);",
            params![link.workspace_id.to_string(), link.source.0, link.target.0],
            |row| row.get(0),
        )?;
        if endpoints_in_scope != 2 {
            return Err(StoreError::Rejected(format!(
                "link {} -> {} crosses workspace {}",
                link.source, link.target, link.workspace_id
            )));
        }
        conn.execute(
            "INSERT INTO links (source, target, workspace_id) VALUES (?1, ?2, ?3);",
            params![link.source.0, link.target.0, link.workspace_id.to_string()],
        )?;
        Ok(link)
    }

    async fn delete_links_touching(&self, workspace_id: WorkspaceId, id: NodeId) -> StoreResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM links WHERE workspace_id = ?1 AND (source = ?2 OR target = ?2);",
            params![workspace_id.to_string(), id.0],
        )?;
        Ok(removed)
    }
}
