//! Core types for animated login rankings.
//!
//! This crate provides:
//! - `scale` / `window`: calendar scales and the canonical query windows built on them
//! - `period`: the scale constraints a period selector has to honour
//! - `ranking`: top-N rankings and the merge that feeds an animated transition
//! - `color`: the append-only key to color table
//! - `aggregation`: the aggregation service contract (and, with `api`, its HTTP client)
//! - `names`: display names for entity ids
//! - `mock`: a scripted aggregation client for tests

pub mod aggregation;
pub mod color;
pub mod error;
#[cfg(feature = "api")]
pub mod http;
pub mod mock;
pub mod names;
pub mod period;
pub mod ranking;
pub mod scale;
pub mod window;
