//! In-memory graph for the active workspace.
//!
//! # Responsibility
//! - Hold the single in-memory copy of nodes and links.
//! - Enforce link invariants (endpoints exist, no self-links, no duplicates).
//! - Publish immutable snapshots for renderers.
//!
//! # Invariants
//! - Every link references two nodes present in the same snapshot.
//! - A published snapshot is never mutated afterwards.

pub mod model;
