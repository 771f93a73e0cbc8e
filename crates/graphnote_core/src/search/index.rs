//! Substring lookup producing navigation targets.

use crate::graph::model::GraphModel;
use crate::model::node::{Category, Node, NodeId};
use crate::model::palette::category_color;
use crate::search::preview::content_preview;

/// One search result, ready for display and teleport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: NodeId,
    pub name: String,
    pub category: Category,
    pub color: &'static str,
    pub preview: Option<String>,
}

impl SearchHit {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            category: node.category.clone(),
            color: category_color(&node.category),
            preview: content_preview(&node.content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Blank query: hide the results surface.
    Hidden,
    /// Matches in graph order; may be empty.
    Results(Vec<SearchHit>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Hidden => &[],
            Self::Results(hits) => hits,
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }
}

/// Stateless query front over the current graph. Nothing is cached: every
/// query rescans the model it is given.
///
/// The default index returns every match; a cap is opt-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchIndex {
    limit: Option<usize>,
}

impl SearchIndex {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self::new(Some(limit))
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whitespace only decides blankness; a non-blank query matches as typed.
    pub fn query(&self, model: &GraphModel, text: &str) -> SearchOutcome {
        if text.trim().is_empty() {
            return SearchOutcome::Hidden;
        }
        let matches = model.find_by_name_substring(text);
        let hits = match self.limit {
            Some(limit) => matches.take(limit).map(SearchHit::from_node).collect(),
            None => matches.map(SearchHit::from_node).collect(),
        };
        SearchOutcome::Results(hits)
    }
}
