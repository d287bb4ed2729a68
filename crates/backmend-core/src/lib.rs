//! # Backmend Core Library
//!
//! Repairs protein structures with missing backbone residues: a generative
//! model proposes backbone angles for the gaps, the angles are rebuilt into
//! Cartesian coordinates and grafted onto the input, and the grafted
//! residues are relaxed by restrained gradient descent before the best
//! candidate is chosen.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`,
//!   `AngleTable`), backbone geometry (angle extraction, NeRF rebuilding,
//!   merging), restraint potentials and file I/O.
//!
//! - **[`engine`]: The Logic Core.** Padding and feature alignment, the
//!   missing-residue mask, the sampler seam, batched refinement and candidate
//!   selection, together with configuration, progress and error types.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into
//!   complete procedures with a single entry point each.

pub mod core;
pub mod engine;
pub mod workflows;
