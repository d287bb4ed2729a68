use super::refine::{FINE_TUNED_DIR, RefinementJob, refine_and_write, select_bests};
use crate::core::backbone::angles::AngleTable;
use crate::core::backbone::merge::merge_backbone;
use crate::core::backbone::nerf::build_backbone;
use crate::core::forcefield::scoring::QualityScorer;
use crate::core::io::angles::write_angle_table;
use crate::core::io::missing::MissingInfoRecord;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::engine::config::CorrectionConfig;
use crate::engine::error::EngineError;
use crate::engine::features::{
    AngleStatistics, FeatureBundle, align_features, real_len_from_attention_mask,
};
use crate::engine::mask::{MissingMask, load_missing_info_mask};
use crate::engine::padding::{compute_pad_len, real_len_of_structure};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sampler::{AngleSampler, SamplingRequest, sample_candidates};
use crate::engine::selection::Selection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const SAMPLED_ANGLES_DIR: &str = "sampled_angles";
pub const SAMPLED_PDB_DIR: &str = "sampled_pdb";

#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub real_len: usize,
    pub pad_len: usize,
    pub missing_residues: usize,
    pub sampled_angles: Vec<PathBuf>,
    pub sampled_pdbs: Vec<PathBuf>,
    pub refined_pdbs: Vec<PathBuf>,
    /// Indices of sampled tables that could not be rebuilt into a structure.
    pub rejected: Vec<usize>,
    /// Indices of candidates whose refinement diverged.
    pub failed: Vec<usize>,
    pub original_best: Selection,
    pub fine_tuned_best: Option<Selection>,
}

/// Model inputs derived from one structure.
pub struct PreparedInput {
    pub structure: Structure,
    pub record: MissingInfoRecord,
    pub stats: AngleStatistics,
    pub features: FeatureBundle,
    pub mask: MissingMask,
}

impl PreparedInput {
    pub fn real_len(&self) -> usize {
        self.features.real_len()
    }

    pub fn pad_len(&self) -> usize {
        self.features.pad_len()
    }
}

/// Runs the full correction pipeline on one structure: feature alignment,
/// angle sampling, backbone reconstruction, restrained refinement and best
/// candidate selection. Every intermediate product is written below
/// `config.output_dir`.
#[instrument(skip_all, name = "correction_workflow")]
pub fn run(
    config: &CorrectionConfig,
    sampler: &dyn AngleSampler,
    scorer: &dyn QualityScorer,
    reporter: &ProgressReporter,
) -> Result<CorrectionResult, EngineError> {
    // === Phase 0: Inputs, padding, features and mask ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let prepared = prepare(
        &config.structure_path,
        &config.missing_record_path,
        &config.stats_path,
        config.window.window_size,
        config.window.window_step,
    )?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Sampling ===
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let request = SamplingRequest {
        stats: &prepared.stats,
        real_len: prepared.real_len(),
        missing_mask: &prepared.mask,
        features: &prepared.features,
        n: config.sampling.num_candidates,
        batch_size: config.sampling.batch_size,
        window_size: config.window.window_size,
        window_step: config.window.window_step,
        pad_len: prepared.pad_len(),
        seed: config.sampling.seed,
    };
    let tables = sample_candidates(sampler, &request)?;
    let sampled_angles = write_tables(&tables, &config.output_dir.join(SAMPLED_ANGLES_DIR))?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Reconstruction ===
    reporter.report(Progress::PhaseStart {
        name: "Reconstruction",
    });
    let real_len = prepared.real_len();
    let residue_mask = prepared.mask.residue_mask(real_len);
    let (candidates, rejected) = reconstruct(&prepared.structure, &residue_mask, &tables, reporter);
    let sampled_pdbs = write_candidates(&candidates, &config.output_dir.join(SAMPLED_PDB_DIR))?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Refinement ===
    let masks = prepared.mask.repeat(candidates.len());
    let jobs: Vec<RefinementJob<'_>> = candidates
        .iter()
        .zip(masks.rows())
        .map(|((index, structure), mask)| RefinementJob {
            index: *index,
            structure,
            residue_mask: mask.iter().take(real_len).copied().collect(),
            file_name: candidate_file_name(*index),
        })
        .collect();
    let (refined_pdbs, failed) = refine_and_write(
        &jobs,
        &config.refinement,
        &config.restraints,
        &config.output_dir.join(FINE_TUNED_DIR),
        reporter,
    )?;

    // === Phase 4: Selection ===
    let (original_best, fine_tuned_best) = select_bests(
        &sampled_pdbs,
        &refined_pdbs,
        scorer,
        &config.output_dir,
        reporter,
    )?;

    info!(
        candidates = candidates.len(),
        rejected = rejected.len(),
        refined = refined_pdbs.len(),
        "Correction workflow complete."
    );
    Ok(CorrectionResult {
        real_len: prepared.real_len(),
        pad_len: prepared.pad_len(),
        missing_residues: prepared.mask.count(),
        sampled_angles,
        sampled_pdbs,
        refined_pdbs,
        rejected,
        failed,
        original_best,
        fine_tuned_best,
    })
}

/// Loads the inputs of one structure and derives the padded features and
/// missing-residue mask a sampler is conditioned on.
#[instrument(skip_all, name = "prepare_input")]
pub fn prepare(
    structure_path: &Path,
    missing_record_path: &Path,
    stats_path: &Path,
    window_size: usize,
    window_step: usize,
) -> Result<PreparedInput, EngineError> {
    info!("Loading structure, missing-residue record and angle statistics.");
    let structure =
        PdbFile::read_structure(structure_path).map_err(|e| EngineError::pdb(structure_path, e))?;
    let record = MissingInfoRecord::load(missing_record_path)?;
    let stats = AngleStatistics::load(stats_path)?;

    let ca_count = real_len_of_structure(&structure);
    let pad_len = compute_pad_len(ca_count, window_size, window_step);
    let features = align_features(&structure, &stats, pad_len)?;
    let real_len = real_len_from_attention_mask(features.attention_mask());
    if real_len != ca_count {
        warn!(
            ca_count,
            backbone_residues = real_len,
            "Alpha-carbon count differs from the backbone length; using the backbone length."
        );
    }
    let mask = load_missing_info_mask(&record, pad_len, real_len)?;
    if mask.count() == 0 {
        warn!("The missing-residue record flags no residues; candidates will match the input.");
    }

    info!(
        real_len,
        pad_len,
        missing = mask.count(),
        "Prepared model inputs."
    );
    Ok(PreparedInput {
        structure,
        record,
        stats,
        features,
        mask,
    })
}

fn candidate_file_name(index: usize) -> String {
    format!("generated_{index}.pdb")
}

fn write_tables(tables: &[AngleTable], dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut paths = Vec::with_capacity(tables.len());
    for (i, table) in tables.iter().enumerate() {
        let path = dir.join(format!("generated_{i}.csv.gz"));
        write_angle_table(table, &path)?;
        paths.push(path);
    }
    info!(tables = paths.len(), dir = %dir.display(), "Wrote sampled angles.");
    Ok(paths)
}

/// Rebuilds every sampled table into Cartesian space and grafts the
/// predicted residues onto the input structure.
///
/// A table that cannot be rebuilt or merged only drops its own candidate;
/// the built candidates keep their table index.
fn reconstruct(
    original: &Structure,
    residue_mask: &[bool],
    tables: &[AngleTable],
    reporter: &ProgressReporter,
) -> (Vec<(usize, Structure)>, Vec<usize>) {
    reporter.report(Progress::TaskStart {
        total_steps: tables.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = tables.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = tables.par_iter().enumerate();

    let outcomes: Vec<Result<Structure, EngineError>> = iterator
        .map(|(candidate, table)| {
            let merged = build_backbone(table)
                .map_err(|source| EngineError::Reconstruction { candidate, source })
                .and_then(|coords| {
                    merge_backbone(original, residue_mask, &coords)
                        .map_err(|source| EngineError::Merge { candidate, source })
                });
            reporter.report(Progress::TaskIncrement);
            merged
        })
        .collect();
    reporter.report(Progress::TaskFinish);

    let mut built = Vec::with_capacity(outcomes.len());
    let mut rejected = Vec::new();
    for (candidate, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(structure) => built.push((candidate, structure)),
            Err(e) => {
                warn!(candidate, "Dropping candidate: {}", e);
                reporter.message(format!("Candidate {candidate} could not be rebuilt"));
                rejected.push(candidate);
            }
        }
    }
    (built, rejected)
}

fn write_candidates(
    candidates: &[(usize, Structure)],
    dir: &Path,
) -> Result<Vec<PathBuf>, EngineError> {
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut paths = Vec::with_capacity(candidates.len());
    for (index, structure) in candidates {
        let path = dir.join(candidate_file_name(*index));
        PdbFile::write_structure(structure, &path).map_err(|e| EngineError::pdb(&path, e))?;
        paths.push(path);
    }
    info!(candidates = paths.len(), dir = %dir.display(), "Wrote reconstructed candidates.");
    Ok(paths)
}
