use crate::core::io::missing::{MissingInfoRecord, ResidueLabel};
use ndarray::{Array1, Array2};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("Missing residue {residue} of chain {chain} has no entry in the index mapping")]
    UnmappedResidue { chain: String, residue: String },
    #[error("Chain {chain} lists missing residues but has no index mapping")]
    MissingChainMapping { chain: String },
    #[error(
        "Missing residue {residue} of chain {chain} maps to position {index}, outside the {real_len} real residues"
    )]
    OutOfRange {
        chain: String,
        residue: String,
        index: usize,
        real_len: usize,
    },
}

/// Positions of a padded sequence whose residues must be generated.
///
/// Always a subset of the attention mask: only the leading `real_len`
/// positions can be flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMask {
    mask: Array1<bool>,
}

impl MissingMask {
    pub fn as_array(&self) -> &Array1<bool> {
        &self.mask
    }

    pub fn pad_len(&self) -> usize {
        self.mask.len()
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    pub fn is_missing(&self, position: usize) -> bool {
        self.mask.get(position).copied().unwrap_or(false)
    }

    /// The first `len` positions as a residue mask.
    pub fn residue_mask(&self, len: usize) -> Vec<bool> {
        (0..len).map(|i| self.is_missing(i)).collect()
    }

    /// One copy of the mask per candidate, shape `(n, pad_len)`.
    pub fn repeat(&self, n: usize) -> Array2<bool> {
        Array2::from_shape_fn((n, self.mask.len()), |(_, j)| self.mask[j])
    }
}

/// Builds the missing mask of a `pad_len` sequence from a missing-residue
/// record.
///
/// Chains are visited in sorted order; each missing id is looked up in the
/// chain's index mapping by its textual form (`52` or `52A`).
pub fn load_missing_info_mask(
    record: &MissingInfoRecord,
    pad_len: usize,
    real_len: usize,
) -> Result<MissingMask, MaskError> {
    let limit = real_len.min(pad_len);
    let mut mask = Array1::from_elem(pad_len, false);

    for (chain, ids) in &record.missing_residues_id {
        if ids.is_empty() {
            continue;
        }
        let mapping = record
            .index_mapping
            .get(chain)
            .ok_or_else(|| MaskError::MissingChainMapping {
                chain: chain.clone(),
            })?;

        for id in ids {
            let label = label_key(id);
            let index = *mapping.get(&label).ok_or_else(|| MaskError::UnmappedResidue {
                chain: chain.clone(),
                residue: label.clone(),
            })?;
            if index >= limit {
                return Err(MaskError::OutOfRange {
                    chain: chain.clone(),
                    residue: label,
                    index,
                    real_len,
                });
            }
            mask[index] = true;
        }
    }

    let mask = MissingMask { mask };
    debug!(missing = mask.count(), pad_len, "Built missing-residue mask.");
    Ok(mask)
}

fn label_key(id: &ResidueLabel) -> String {
    id.to_string().trim().to_string()
}

/// Expands a per-residue mask to the three backbone atoms (N, CA, C) of
/// each residue.
pub fn atom_mask_from_residue_mask(residue_mask: &[bool]) -> Vec<bool> {
    residue_mask.iter().flat_map(|&m| [m; 3]).collect()
}
