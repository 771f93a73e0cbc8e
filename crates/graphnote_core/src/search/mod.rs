//! Name search over the loaded graph.
//!
//! # Responsibility
//! - Find nodes by case-insensitive name substring for the search box.
//! - Shape hits for display (color, content preview).
//!
//! # Invariants
//! - Results follow graph insertion order; there is no relevance ranking.
//! - Blank queries never produce hits.

pub mod index;
pub mod preview;
