//! Workspace synchronization with the row store.
//!
//! # Responsibility
//! - Load whole workspaces into the graph model.
//! - Mirror node/link/content mutations as scoped remote writes.
//!
//! # Invariants
//! - Every remote call is scoped to one workspace id.
//! - Late responses from superseded loads are discarded.

pub mod controller;
