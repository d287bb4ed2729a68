//! Backbone geometry: the six canonical angles, NeRF reconstruction from
//! angles, and merging of predicted backbones into an existing structure.

pub mod angles;
pub mod merge;
pub mod nerf;
