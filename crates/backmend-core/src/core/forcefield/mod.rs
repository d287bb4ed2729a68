//! # Force Field Module
//!
//! Energy and quality functions over protein backbones.
//!
//! - [`restraints`] - the [`restraints::ConstraintEnergy`] seam minimized during
//!   refinement, with the default [`restraints::BackboneRestraints`]
//!   (harmonic bonds, 1-3 distance restraints and a clash wall)
//! - [`scoring`] - the [`scoring::QualityScorer`] seam used to rank finished
//!   candidates, with the default [`scoring::GeometryScorer`]
//! - [`term`] - per-component energy breakdown
//!
//! Neither default reproduces a published force field; both exist so the
//! pipeline can run end to end and can be swapped for a real energy.

pub(crate) mod potentials;
pub mod restraints;
pub mod scoring;
pub mod term;
