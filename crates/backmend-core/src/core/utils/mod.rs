//! Geometry primitives and small numeric helpers shared across the crate.

pub mod geometry;
pub mod numeric;
