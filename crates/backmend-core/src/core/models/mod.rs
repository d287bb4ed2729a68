//! # Core Models Module
//!
//! Data structures describing a protein structure as it flows through the
//! correction pipeline.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom records, backbone roles and residue keys
//! - [`structure`] - Ordered atom lists and their N/CA/C backbone view
//!
//! ## Usage
//!
//! ```ignore
//! use backmend::core::io::{pdb::PdbFile, traits::MolecularFile};
//!
//! let structure = PdbFile::read_structure("input.pdb")?;
//! let backbone = structure.backbone()?;
//! println!("{} residues", backbone.len());
//! ```

pub mod atom;
pub mod structure;
