//! Node, link and workspace records.
//!
//! # Responsibility
//! - Define the single node shape used by the model, the store and renderers.
//! - Validate user drafts before anything reaches the store.
//!
//! # Invariants
//! - `NodeId` values only ever come from the row store.
//! - `name` is non-blank after trimming for every persisted node.
//! - Link identity is the unordered `{source, target}` pair.

use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Store-assigned workspace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    /// Generates a fresh id. Only store adapters call this.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for WorkspaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic category. Drives node color in renderers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "String")]
pub enum Category {
    #[default]
    General,
    CS,
    Math,
    Personal,
    Project,
    /// Label written by another client that this build does not know.
    Custom(String),
}

impl Category {
    /// Parses a stored label. Blank labels fall back to `General`.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "general" => Self::General,
            "cs" => Self::CS,
            "math" => Self::Math,
            "personal" => Self::Personal,
            "project" => Self::Project,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::General => "General",
            Self::CS => "CS",
            Self::Math => "Math",
            Self::Personal => "Personal",
            Self::Project => "Project",
            Self::Custom(label) => label.as_str(),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.map_or(Self::General, |value| Self::parse(&value)))
    }
}

/// Validation failures for local input. Never reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Node name is empty after trimming.
    EmptyName,
    /// Link endpoint is not part of the current graph.
    InvalidEndpoint(NodeId),
    /// Link source and target are the same node.
    SelfLink(NodeId),
    /// The unordered pair is already linked.
    DuplicateLink { source: NodeId, target: NodeId },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "node name must not be blank"),
            Self::InvalidEndpoint(id) => write!(f, "link endpoint not in graph: {id}"),
            Self::SelfLink(id) => write!(f, "cannot link node {id} to itself"),
            Self::DuplicateLink { source, target } => {
                write!(f, "nodes {source} and {target} are already linked")
            }
        }
    }
}

impl Error for ValidationError {}

/// A topic in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Markdown source. Authoritative copy lives in the store; the editor
    /// re-fetches it on open.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub category: Category,
    pub workspace_id: WorkspaceId,
}

impl Node {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// User input for a node that does not exist in the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub name: String,
    pub category: Option<Category>,
}

impl NodeDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Trims the name and resolves the default category.
    pub fn normalized(&self) -> Result<NodeDraft, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(NodeDraft {
            name: name.to_string(),
            category: Some(self.category.clone().unwrap_or_default()),
        })
    }

    /// Resolved category for persistence.
    pub fn category_or_default(&self) -> Category {
        self.category.clone().unwrap_or_default()
    }
}

/// Stored association between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub workspace_id: WorkspaceId,
}

impl Link {
    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    /// True when both links join the same two nodes, in either direction.
    pub fn same_pair(&self, a: NodeId, b: NodeId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Named partition for nodes and links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{Category, Link, NodeDraft, NodeId, ValidationError, WorkspaceId};

    #[test]
    fn draft_rejects_whitespace_name() {
        let err = NodeDraft::new("   \t").normalized().unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn draft_defaults_category_to_general() {
        let draft = NodeDraft::new("  Algebra ").normalized().unwrap();
        assert_eq!(draft.name, "Algebra");
        assert_eq!(draft.category, Some(Category::General));
    }

    #[test]
    fn category_parse_keeps_unknown_labels() {
        assert_eq!(Category::parse("math"), Category::Math);
        assert_eq!(Category::parse(""), Category::General);
        assert_eq!(
            Category::parse("Recipes"),
            Category::Custom("Recipes".to_string())
        );
    }

    #[test]
    fn same_pair_ignores_orientation() {
        let link = Link {
            source: NodeId(1),
            target: NodeId(2),
            workspace_id: WorkspaceId::generate(),
        };
        assert!(link.same_pair(NodeId(2), NodeId(1)));
        assert!(!link.same_pair(NodeId(1), NodeId(3)));
    }
}
