//! File formats read and written by the pipeline.
//!
//! Structures go through the [`traits::MolecularFile`] trait ([`pdb::PdbFile`]);
//! angle tables are gzip-aware CSV ([`angles`]); missing-residue records are
//! JSON ([`missing`]).

pub mod angles;
pub mod missing;
pub mod pdb;
pub mod traits;
