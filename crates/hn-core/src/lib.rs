//! hn-core: stable foundation for hydronet.
//!
//! Contains:
//! - ids (stable compact IDs for network elements and connections)
//! - numeric (Real + tolerances + float helpers)

pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use numeric::*;
