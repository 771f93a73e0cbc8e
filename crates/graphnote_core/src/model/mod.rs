//! Graph domain model shared by every engine layer.
//!
//! # Responsibility
//! - Define the canonical node/link/workspace records.
//! - Own the pure category → color palette used by renderers.
//!
//! # Invariants
//! - Node ids are assigned by the row store, never generated client-side.
//! - A missing category always reads back as `Category::General`.

pub mod node;
pub mod palette;
