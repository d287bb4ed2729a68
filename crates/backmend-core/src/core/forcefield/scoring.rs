use super::potentials::clash_wall;
use crate::core::backbone::nerf::{CA_C_BOND_LENGTH, C_N_BOND_LENGTH, N_CA_BOND_LENGTH};
use crate::core::models::structure::{Structure, StructureError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),
    #[error("Structure has no backbone residue to score")]
    EmptyBackbone,
}

/// Scores a whole structure; lower is better.
pub trait QualityScorer: Send + Sync {
    fn score(&self, structure: &Structure) -> Result<f64, ScoringError>;
}

/// RMS deviation of backbone bond lengths from ideal, plus a clash penalty
/// normalized by residue count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryScorer {
    pub clash_distance: f64,
    pub clash_weight: f64,
}

impl Default for GeometryScorer {
    fn default() -> Self {
        Self {
            clash_distance: 3.0,
            clash_weight: 1.0,
        }
    }
}

impl QualityScorer for GeometryScorer {
    fn score(&self, structure: &Structure) -> Result<f64, ScoringError> {
        let backbone = structure.backbone()?;
        if backbone.is_empty() {
            return Err(ScoringError::EmptyBackbone);
        }

        let breaks = backbone.chain_breaks();
        let coords = &backbone.coords;
        let residues = backbone.len();

        let mut sum_sq = 0.0;
        let mut bonds = 0usize;
        let mut add_bond = |a: usize, b: usize, ideal: f64| {
            let deviation = (coords[a] - coords[b]).norm() - ideal;
            sum_sq += deviation * deviation;
            bonds += 1;
        };
        for i in 0..residues {
            add_bond(3 * i, 3 * i + 1, N_CA_BOND_LENGTH);
            add_bond(3 * i + 1, 3 * i + 2, CA_C_BOND_LENGTH);
            if i + 1 < residues && breaks.binary_search(&(i + 1)).is_err() {
                add_bond(3 * i + 2, 3 * i + 3, C_N_BOND_LENGTH);
            }
        }
        let rms_bond = (sum_sq / bonds as f64).sqrt();

        let cutoff_sq = self.clash_distance * self.clash_distance;
        let mut clash = 0.0;
        for a in 0..coords.len() {
            for b in (a + 4)..coords.len() {
                let dist_sq = (coords[a] - coords[b]).norm_squared();
                if dist_sq < cutoff_sq {
                    clash += clash_wall(dist_sq.sqrt(), self.clash_distance, 1.0).0;
                }
            }
        }

        Ok(rms_bond + self.clash_weight * clash / residues as f64)
    }
}
