use super::atom::{Atom, BackboneRole, ResidueKey};
use nalgebra::Point3;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
    #[error("Residue {residue} has an incomplete backbone (missing atom {missing})")]
    IncompleteBackbone {
        residue: ResidueKey,
        missing: &'static str,
    },
    #[error("Expected {expected} coordinates but got {actual}")]
    CoordinateCount { expected: usize, actual: usize },
}

/// An ordered list of atom records.
///
/// A `Structure` is never edited in place by the pipeline: every operation
/// that changes coordinates returns a new value, which keeps the original
/// input available for merging and scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    atoms: Vec<Atom>,
}

/// The N/CA/C atoms of a structure, flattened to three points per residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Backbone {
    /// Residues in file order.
    pub residues: Vec<ResidueKey>,
    /// `coords[3 * i + k]` is atom `k` (N, CA, C) of residue `i`.
    pub coords: Vec<Point3<f64>>,
    /// Index into [`Structure::atoms`] for every entry of `coords`.
    pub atom_indices: Vec<usize>,
}

impl Backbone {
    /// Number of residues.
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Residue indices that start a new chain, excluding the first residue.
    pub fn chain_breaks(&self) -> Vec<usize> {
        self.residues
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].chain_id != pair[1].chain_id)
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// The `[N, CA, C]` triple of residue `i`.
    pub fn residue_atoms(&self, i: usize) -> [Point3<f64>; 3] {
        [
            self.coords[3 * i],
            self.coords[3 * i + 1],
            self.coords[3 * i + 2],
        ]
    }
}

impl Structure {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn into_atoms(self) -> Vec<Atom> {
        self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Number of alpha carbons, i.e. the residue count used for padding.
    pub fn ca_count(&self) -> usize {
        self.atoms
            .iter()
            .filter(|a| !a.hetero && a.backbone_role() == BackboneRole::CA)
            .count()
    }

    /// Extracts the protein backbone.
    ///
    /// Residues without any backbone atom (waters, ligands) are skipped; a
    /// residue that has some but not all of N, CA and C is an error because
    /// the three-atoms-per-residue layout would be broken.
    pub fn backbone(&self) -> Result<Backbone, StructureError> {
        let mut order: Vec<ResidueKey> = Vec::new();
        let mut slots: HashMap<ResidueKey, [Option<usize>; 3]> = HashMap::new();

        for (idx, atom) in self.atoms.iter().enumerate() {
            if atom.hetero {
                continue;
            }
            let Some(offset) = atom.backbone_role().offset() else {
                continue;
            };
            let entry = slots.entry(atom.residue).or_insert_with(|| {
                order.push(atom.residue);
                [None; 3]
            });
            // Alternate locations: the first record wins.
            if entry[offset].is_none() {
                entry[offset] = Some(idx);
            }
        }

        let mut coords = Vec::with_capacity(order.len() * 3);
        let mut atom_indices = Vec::with_capacity(order.len() * 3);
        for key in &order {
            let triple = slots[key];
            for (offset, name) in ["N", "CA", "C"].into_iter().enumerate() {
                let idx = triple[offset].ok_or(StructureError::IncompleteBackbone {
                    residue: *key,
                    missing: name,
                })?;
                coords.push(self.atoms[idx].position);
                atom_indices.push(idx);
            }
        }

        Ok(Backbone {
            residues: order,
            coords,
            atom_indices,
        })
    }

    /// Returns a copy with every atom position replaced, in atom order.
    pub fn with_positions(&self, positions: &[Point3<f64>]) -> Result<Self, StructureError> {
        if positions.len() != self.atoms.len() {
            return Err(StructureError::CoordinateCount {
                expected: self.atoms.len(),
                actual: positions.len(),
            });
        }
        let atoms = self
            .atoms
            .iter()
            .zip(positions)
            .map(|(atom, &position)| Atom {
                position,
                ..atom.clone()
            })
            .collect();
        Ok(Self { atoms })
    }

    /// Returns a copy where the backbone atoms of residues flagged in
    /// `residue_mask` take their positions from `coords` (three per residue,
    /// same layout as [`Backbone::coords`]). All other records are cloned
    /// unchanged.
    pub fn with_backbone_positions(
        &self,
        residue_mask: &[bool],
        coords: &[Point3<f64>],
    ) -> Result<Self, StructureError> {
        let backbone = self.backbone()?;
        if coords.len() != backbone.coords.len() {
            return Err(StructureError::CoordinateCount {
                expected: backbone.coords.len(),
                actual: coords.len(),
            });
        }

        let mut atoms = self.atoms.clone();
        for (residue_idx, _) in residue_mask
            .iter()
            .take(backbone.len())
            .enumerate()
            .filter(|(_, masked)| **masked)
        {
            for k in 0..3 {
                let flat = 3 * residue_idx + k;
                atoms[backbone.atom_indices[flat]].position = coords[flat];
            }
        }
        Ok(Self { atoms })
    }
}

impl From<Vec<Atom>> for Structure {
    fn from(atoms: Vec<Atom>) -> Self {
        Self::new(atoms)
    }
}
