use thiserror::Error;

use super::config::ConfigError;
use super::features::FeatureError;
use super::mask::MaskError;
use super::refinement::RefinementError;
use super::sampler::SamplerError;
use super::selection::SelectionError;
use crate::core::backbone::merge::MergeError;
use crate::core::backbone::nerf::NerfError;
use crate::core::forcefield::scoring::ScoringError;
use crate::core::io::angles::AngleTableError;
use crate::core::io::missing::RecordError;
use crate::core::io::pdb::PdbError;
use crate::core::models::structure::StructureError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read or write structure '{path}': {source}")]
    Pdb { path: String, source: PdbError },

    #[error(transparent)]
    AngleTable(#[from] AngleTableError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("Feature construction failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Missing-residue mask is invalid: {0}")]
    Mask(#[from] MaskError),

    #[error("Sampling failed: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Backbone reconstruction failed for candidate {candidate}: {source}")]
    Reconstruction { candidate: usize, source: NerfError },

    #[error("Merging candidate {candidate} into the original structure failed: {source}")]
    Merge { candidate: usize, source: MergeError },

    #[error("Refinement failed: {0}")]
    Refinement(#[from] RefinementError),

    #[error("Energy scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Candidate selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Workflow phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },
}

impl EngineError {
    pub(crate) fn pdb(path: &std::path::Path, source: PdbError) -> Self {
        Self::Pdb {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
