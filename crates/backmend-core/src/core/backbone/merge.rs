use crate::core::models::structure::{Structure, StructureError};
use crate::core::utils::geometry::superposition;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),
    #[error("Replacement mask covers {mask} residues but the structure has {residues}")]
    MaskLength { mask: usize, residues: usize },
    #[error("Predicted backbone has {actual} atoms, expected {expected}")]
    CoordinateCount { expected: usize, actual: usize },
    #[error("Could not superpose the predicted backbone onto the original")]
    Superposition,
}

/// Combines an original structure with a predicted backbone.
///
/// `predicted` holds N/CA/C for every residue of `original` (three points per
/// residue) in an arbitrary frame. It is first superposed onto the residues
/// that are *not* being replaced, then the backbone atoms of residues flagged
/// in `replaced_mask` take the superposed coordinates. All other records,
/// including side-chain and hetero atoms, are kept unchanged.
///
/// `replaced_mask` may be longer than the residue count (padded masks); the
/// extra entries must all be `false`.
pub fn merge_backbone(
    original: &Structure,
    replaced_mask: &[bool],
    predicted: &[Point3<f64>],
) -> Result<Structure, MergeError> {
    let backbone = original.backbone()?;
    let residues = backbone.len();

    if replaced_mask.len() < residues || replaced_mask[residues..].iter().any(|m| *m) {
        return Err(MergeError::MaskLength {
            mask: replaced_mask.iter().rposition(|m| *m).map_or(replaced_mask.len(), |p| p + 1),
            residues,
        });
    }
    if predicted.len() != backbone.coords.len() {
        return Err(MergeError::CoordinateCount {
            expected: backbone.coords.len(),
            actual: predicted.len(),
        });
    }

    let mask = &replaced_mask[..residues];
    let anchors: Vec<usize> = (0..predicted.len()).filter(|&i| !mask[i / 3]).collect();
    let anchors: Vec<usize> = if anchors.len() >= 3 {
        anchors
    } else {
        (0..predicted.len()).collect()
    };

    let from: Vec<_> = anchors.iter().map(|&i| predicted[i]).collect();
    let to: Vec<_> = anchors.iter().map(|&i| backbone.coords[i]).collect();
    let (rotation, translation) = superposition(&from, &to).ok_or(MergeError::Superposition)?;

    let aligned: Vec<_> = predicted.iter().map(|p| rotation * p + translation).collect();
    Ok(original.with_backbone_positions(mask, &aligned)?)
}
