//! Signal screening over computed indicator state.
//!
//! Queries run against an in-memory snapshot of indicator rows and price
//! series; the persistence collaborator decides what to load and how far
//! back. All queries return hits ordered by signal recency descending,
//! then security name ascending.

pub mod screener;


pub use screener::*;
