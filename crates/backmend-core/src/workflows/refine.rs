use crate::core::backbone::merge::merge_backbone;
use crate::core::forcefield::restraints::{BackboneRestraints, RestraintParams};
use crate::core::forcefield::scoring::QualityScorer;
use crate::core::io::missing::MissingInfoRecord;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::calculate_rmsd;
use crate::engine::config::{RefineConfig, RefinementConfig};
use crate::engine::error::EngineError;
use crate::engine::mask::{atom_mask_from_residue_mask, load_missing_info_mask};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::refinement::{RefinementEngine, RefinementInput};
use crate::engine::selection::{Selection, select_and_copy};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const FINE_TUNED_DIR: &str = "fine_tuned";
pub const BEST_DIR: &str = "best_pdb";
pub const ORIGINAL_BEST_NAME: &str = "original_best.pdb";
pub const FINE_TUNED_BEST_NAME: &str = "fine_tuned_best.pdb";

#[derive(Debug, Clone)]
pub struct RefineResult {
    pub refined_pdbs: Vec<PathBuf>,
    /// Indices of candidates whose refinement diverged.
    pub failed: Vec<usize>,
    pub original_best: Selection,
    pub fine_tuned_best: Option<Selection>,
}

/// One structure to refine, the residues allowed to move, and the file
/// name its refined version is written under. `index` identifies the
/// candidate in logs and in the failed list.
pub(crate) struct RefinementJob<'a> {
    pub index: usize,
    pub structure: &'a Structure,
    pub residue_mask: Vec<bool>,
    pub file_name: String,
}

/// Refines existing candidate PDB files and selects the best before and
/// after refinement.
#[instrument(skip_all, name = "refine_workflow")]
pub fn run(
    config: &RefineConfig,
    scorer: &dyn QualityScorer,
    reporter: &ProgressReporter,
) -> Result<RefineResult, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading Candidates",
    });
    let record = MissingInfoRecord::load(&config.missing_record_path)?;

    let mut structures = Vec::with_capacity(config.candidate_paths.len());
    let mut names = Vec::with_capacity(config.candidate_paths.len());
    for (i, path) in config.candidate_paths.iter().enumerate() {
        let structure = PdbFile::read_structure(path).map_err(|e| EngineError::pdb(path, e))?;
        names.push(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("candidate_{i}.pdb")),
        );
        structures.push(structure);
    }

    let mut jobs = Vec::with_capacity(structures.len());
    for (index, (structure, file_name)) in structures.iter().zip(names).enumerate() {
        let residues = structure.backbone()?.len();
        let mask = load_missing_info_mask(&record, residues, residues)?;
        jobs.push(RefinementJob {
            index,
            structure,
            residue_mask: mask.residue_mask(residues),
            file_name,
        });
    }
    info!(
        candidates = jobs.len(),
        missing = record.missing_count(),
        "Loaded candidates for refinement."
    );
    reporter.report(Progress::PhaseFinish);

    let (refined_pdbs, failed) = refine_and_write(
        &jobs,
        &config.refinement,
        &config.restraints,
        &config.output_dir.join(FINE_TUNED_DIR),
        reporter,
    )?;

    let (original_best, fine_tuned_best) = select_bests(
        &config.candidate_paths,
        &refined_pdbs,
        scorer,
        &config.output_dir,
        reporter,
    )?;

    Ok(RefineResult {
        refined_pdbs,
        failed,
        original_best,
        fine_tuned_best,
    })
}

/// Refines the jobs and writes every successfully refined structure to
/// `out_dir`. Returns the written paths and the indices of diverged jobs.
///
/// Fails before any work when `refinement` is not a valid configuration.
pub(crate) fn refine_and_write(
    jobs: &[RefinementJob<'_>],
    refinement: &RefinementConfig,
    restraints: &RestraintParams,
    out_dir: &Path,
    reporter: &ProgressReporter,
) -> Result<(Vec<PathBuf>, Vec<usize>), EngineError> {
    reporter.report(Progress::PhaseStart { name: "Refinement" });

    let mut inputs = Vec::with_capacity(jobs.len());
    for job in jobs {
        let backbone = job.structure.backbone()?;
        inputs.push(RefinementInput {
            atom_mask: atom_mask_from_residue_mask(&job.residue_mask[..backbone.len()]),
            chain_breaks: backbone.chain_breaks(),
            coords: backbone.coords,
        });
    }

    let energy = BackboneRestraints::new(*restraints);
    let engine = RefinementEngine::new(*refinement, &energy)?;
    let results = engine.refine(&inputs, reporter);

    fs::create_dir_all(out_dir).map_err(|e| EngineError::io(out_dir, e))?;
    let mut written = Vec::new();
    let mut failed = Vec::new();
    for ((job, input), result) in jobs.iter().zip(&inputs).zip(results) {
        let candidate = job.index;
        match result {
            Ok(refined) => {
                debug!(
                    candidate,
                    initial = refined.initial_energy,
                    r#final = refined.final_energy,
                    steps = refined.steps,
                    rmsd = calculate_rmsd(&input.coords, &refined.coords),
                    "Candidate refined."
                );
                let merged = merge_backbone(job.structure, &job.residue_mask, &refined.coords)
                    .map_err(|source| EngineError::Merge { candidate, source })?;
                let path = out_dir.join(&job.file_name);
                PdbFile::write_structure(&merged, &path).map_err(|e| EngineError::pdb(&path, e))?;
                written.push(path);
            }
            Err(e) => {
                warn!(candidate, "Skipping candidate: {}", e);
                failed.push(candidate);
            }
        }
    }

    info!(
        written = written.len(),
        failed = failed.len(),
        dir = %out_dir.display(),
        "Wrote refined structures."
    );
    reporter.report(Progress::PhaseFinish);
    Ok((written, failed))
}

/// Picks `original_best.pdb` among `originals` and, when any refinement
/// succeeded, `fine_tuned_best.pdb` among `refined`.
pub(crate) fn select_bests(
    originals: &[PathBuf],
    refined: &[PathBuf],
    scorer: &dyn QualityScorer,
    output_dir: &Path,
    reporter: &ProgressReporter,
) -> Result<(Selection, Option<Selection>), EngineError> {
    reporter.report(Progress::PhaseStart { name: "Selection" });
    let best_dir = output_dir.join(BEST_DIR);

    let original_best = select_and_copy(originals, scorer, &best_dir.join(ORIGINAL_BEST_NAME))?;
    let fine_tuned_best = if refined.is_empty() {
        warn!("No candidate survived refinement; skipping fine-tuned selection.");
        reporter.message("No refined candidate to select from");
        None
    } else {
        Some(select_and_copy(
            refined,
            scorer,
            &best_dir.join(FINE_TUNED_BEST_NAME),
        )?)
    };

    reporter.report(Progress::PhaseFinish);
    Ok((original_best, fine_tuned_best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::scoring::GeometryScorer;
    use crate::core::models::structure::test_utils::linear_structure;
    use crate::engine::config::{RefineConfigBuilder, RefinementConfigBuilder};
    use nalgebra::Vector3;
    use tempfile::tempdir;

    const RECORD: &str = r#"{
        "missing_residues_id": {"A": [3]},
        "index_mapping": {"A": {"1": 0, "2": 1, "3": 2, "4": 3, "5": 4}}
    }"#;

    fn distorted(shift: f64) -> Structure {
        let structure = linear_structure(5);
        let positions: Vec<_> = structure
            .atoms()
            .iter()
            .map(|a| {
                if a.residue.number == 3 {
                    a.position + Vector3::new(0.0, shift, shift)
                } else {
                    a.position
                }
            })
            .collect();
        structure.with_positions(&positions).unwrap()
    }

    #[test]
    fn refine_workflow_writes_refined_files_and_both_bests() {
        let dir = tempdir().unwrap();
        let record_path = dir.path().join("input.pdb.missing");
        fs::write(&record_path, RECORD).unwrap();

        let mut candidates = Vec::new();
        for (i, shift) in [0.8, 0.2].into_iter().enumerate() {
            let path = dir.path().join(format!("generated_{i}.pdb"));
            PdbFile::write_structure(&distorted(shift), &path).unwrap();
            candidates.push(path);
        }

        let out = dir.path().join("out");
        let config = RefineConfigBuilder::new()
            .candidate_paths(candidates.clone())
            .missing_record_path(record_path)
            .output_dir(out.clone())
            .refinement(
                RefinementConfigBuilder::new()
                    .num_epochs(200)
                    .eval_interval(5)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let result = run(&config, &GeometryScorer::default(), &ProgressReporter::new()).unwrap();

        assert_eq!(result.refined_pdbs.len(), 2);
        assert!(result.failed.is_empty());
        assert_eq!(result.original_best.index, 1);
        assert!(out.join(BEST_DIR).join(ORIGINAL_BEST_NAME).exists());
        assert!(out.join(BEST_DIR).join(FINE_TUNED_BEST_NAME).exists());

        let original = PdbFile::read_structure(&candidates[0]).unwrap();
        let refined = PdbFile::read_structure(&result.refined_pdbs[0]).unwrap();
        for (before, after) in original.atoms().iter().zip(refined.atoms()) {
            if before.residue.number != 3 || !before.is_backbone() {
                assert_eq!(before.position, after.position);
            }
        }
    }

    #[test]
    fn unreadable_candidate_is_an_error() {
        let dir = tempdir().unwrap();
        let record_path = dir.path().join("record.json");
        fs::write(&record_path, RECORD).unwrap();
        let config = RefineConfigBuilder::new()
            .candidate_paths(vec![dir.path().join("absent.pdb")])
            .missing_record_path(record_path)
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();

        let err = run(&config, &GeometryScorer::default(), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::Pdb { .. }));
    }

    #[test]
    fn zero_batch_size_is_refused_instead_of_dropping_candidates() {
        let dir = tempdir().unwrap();
        let structure = distorted(0.5);
        let jobs = [RefinementJob {
            index: 0,
            structure: &structure,
            residue_mask: vec![false, false, true, false, false],
            file_name: "generated_0.pdb".to_string(),
        }];
        let refinement = RefinementConfig {
            batch_size: 0,
            ..RefinementConfig::default()
        };

        let err = refine_and_write(
            &jobs,
            &refinement,
            &RestraintParams::default(),
            &dir.path().join(FINE_TUNED_DIR),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(!dir.path().join(FINE_TUNED_DIR).exists());
    }
}
