//! Core engine for GraphNote.
//! This crate is the single source of truth for graph invariants.

pub mod auth;
pub mod autosave;
pub mod config;
pub mod db;
pub mod graph;
pub mod interaction;
pub mod logging;
pub mod model;
pub mod search;
pub mod session;
pub mod store;
pub mod sync;
pub mod view;

pub use auth::{AuthProvider, LocalAuth, UserSession};
pub use autosave::{AutosavePipeline, ContentSink, SaveState, SaveStatus};
pub use config::{ConfigError, EngineConfig};
pub use graph::model::{GraphModel, GraphSnapshot, ModelError};
pub use interaction::{Effect, InteractionMachine, Mode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::node::{
    Category, Link, Node, NodeDraft, NodeId, ValidationError, Workspace, WorkspaceId,
};
pub use model::palette::category_color;
pub use search::index::{SearchHit, SearchIndex, SearchOutcome};
pub use session::{SessionError, SessionResult, StatusLine, WorkspaceSession};
pub use store::{MemoryRowStore, RowStore, SqliteRowStore, StoreError, StoreOp};
pub use sync::controller::{CascadeReport, LoadOutcome, SyncController, SyncError};
pub use view::GraphView;

/// Minimal health-check API for embedders.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
