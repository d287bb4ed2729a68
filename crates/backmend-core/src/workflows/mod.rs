//! # Workflows Module
//!
//! Top-level entry points that run complete correction procedures.
//!
//! ## Overview
//!
//! A workflow owns resource loading, phase-by-phase progress reporting and
//! the on-disk layout of its outputs. Callers only provide a configuration,
//! the pluggable collaborators (angle sampler, quality scorer) and a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter).
//!
//! - **Correction** ([`correct`]) - Aligns features, samples candidate angle
//!   tables, rebuilds and merges backbones, refines them under geometric
//!   restraints and selects the best candidate before and after refinement.
//! - **Refinement** ([`refine`]) - Runs only the refinement and selection
//!   phases over candidate structures that already exist on disk.
//!
//! ## Output Layout
//!
//! ```text
//! <output_dir>/
//!   sampled_angles/generated_{i}.csv.gz
//!   sampled_pdb/generated_{i}.pdb
//!   fine_tuned/generated_{i}.pdb
//!   best_pdb/original_best.pdb
//!   best_pdb/fine_tuned_best.pdb
//! ```

pub mod correct;
pub mod refine;
