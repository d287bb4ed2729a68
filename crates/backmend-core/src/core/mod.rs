//! # Core Module
//!
//! Stateless building blocks of the correction pipeline.
//!
//! - **Structures** ([`models`]) - atom records and backbone extraction
//! - **Backbone geometry** ([`backbone`]) - canonical angles, NeRF
//!   reconstruction and merging of predicted backbones
//! - **Energies** ([`forcefield`]) - the restraint energy minimized during
//!   refinement and the quality score used to rank candidates
//! - **File I/O** ([`io`]) - PDB, angle tables and missing-residue records
//! - **Utilities** ([`utils`]) - vector geometry and angle arithmetic

pub mod backbone;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
