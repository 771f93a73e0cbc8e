//! Rendering collaborator contract.

use crate::graph::model::GraphSnapshot;
use crate::model::node::NodeId;
use std::sync::Arc;

/// Force-graph renderer driven by the session.
///
/// Layout positions belong to the renderer; the engine only ever names nodes.
pub trait GraphView {
    /// Replaces the rendered graph. The snapshot is complete and immutable.
    fn show(&mut self, snapshot: Arc<GraphSnapshot>);

    /// Recenters and zooms on `id`. Returns `false` when the node has no
    /// layout position yet.
    fn center_on(&mut self, id: NodeId) -> bool;
}
