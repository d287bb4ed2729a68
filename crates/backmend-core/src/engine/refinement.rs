use super::batch::{BatchBuffers, CandidateSlot, PaddedSet};
use super::config::{ConfigError, RefinementConfig};
use super::progress::{Progress, ProgressReporter};
use crate::core::forcefield::restraints::ConstraintEnergy;
use nalgebra::{Point3, Vector3};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefinementError {
    #[error("Refinement of candidate {candidate} diverged (non-finite energy or coordinates)")]
    Divergence { candidate: usize },
    #[error("Candidate {candidate} has {coords} coordinates but an atom mask of {mask}")]
    MaskLength {
        candidate: usize,
        coords: usize,
        mask: usize,
    },
}

/// One candidate to refine: flattened N/CA/C coordinates and the atoms that
/// may move.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementInput {
    pub coords: Vec<Point3<f64>>,
    pub atom_mask: Vec<bool>,
    /// Residue indices that start a new chain.
    pub chain_breaks: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinedCoordinates {
    /// Best coordinates seen, cropped to the input length.
    pub coords: Vec<Point3<f64>>,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub steps: usize,
}

/// Batched gradient descent of candidate backbones on a constraint energy.
pub struct RefinementEngine<'a> {
    config: RefinementConfig,
    energy: &'a dyn ConstraintEnergy,
}

impl<'a> RefinementEngine<'a> {
    /// Fails when `config` breaks an invariant of [`RefinementConfig`], such
    /// as a zero batch size or evaluation interval.
    pub fn new(
        config: RefinementConfig,
        energy: &'a dyn ConstraintEnergy,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, energy })
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Refines every input and returns one result per input, in order.
    ///
    /// A candidate that diverges yields [`RefinementError::Divergence`]
    /// without affecting the rest of its batch.
    #[instrument(skip_all, name = "refinement_engine", fields(candidates = inputs.len()))]
    pub fn refine(
        &self,
        inputs: &[RefinementInput],
        reporter: &ProgressReporter,
    ) -> Vec<Result<RefinedCoordinates, RefinementError>> {
        let set = match PaddedSet::new(inputs) {
            Ok(set) => set,
            Err(err) => {
                warn!("Refusing to refine: {}", err);
                return inputs.iter().map(|_| Err(err.clone())).collect();
            }
        };

        let ranges = set.batch_ranges(self.config.batch_size);
        info!(
            batches = ranges.len(),
            max_len = set.max_len(),
            "Starting refinement."
        );

        let mut results = Vec::with_capacity(inputs.len());
        for (batch_idx, range) in ranges.iter().enumerate() {
            reporter.report(Progress::BatchStart {
                index: batch_idx,
                total: ranges.len(),
                size: range.len(),
            });
            let buffers = set.batch(range.clone());
            results.extend(self.run_batch(buffers, reporter));
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(refined = results.len() - failed, failed, "Refinement finished.");
        results
    }

    fn run_batch(
        &self,
        mut buffers: BatchBuffers,
        reporter: &ProgressReporter,
    ) -> Vec<Result<RefinedCoordinates, RefinementError>> {
        let cfg = &self.config;
        reporter.report(Progress::TaskStart {
            total_steps: buffers.len() as u64,
        });

        let mut epochs_run = 0;
        for epoch in 0..cfg.num_epochs {
            let evaluate = epoch % cfg.eval_interval == 0;

            #[cfg(not(feature = "parallel"))]
            let iterator = buffers.slots.iter_mut();

            #[cfg(feature = "parallel")]
            let iterator = buffers.slots.par_iter_mut();

            let newly_settled: usize = iterator
                .filter(|slot| slot.is_active())
                .map(|slot| usize::from(self.step(slot, evaluate)))
                .sum();

            for _ in 0..newly_settled {
                reporter.report(Progress::TaskIncrement);
            }

            epochs_run = epoch + 1;
            if buffers.all_settled() {
                break;
            }
        }

        for slot in buffers.slots.iter_mut().filter(|s| s.is_active()) {
            self.track_best(slot);
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);
        debug!(
            offset = buffers.offset,
            size = buffers.len(),
            epochs = epochs_run,
            "Batch finished."
        );

        buffers
            .slots
            .iter()
            .map(|slot| {
                if slot.diverged {
                    warn!(candidate = slot.index, "Candidate diverged during refinement.");
                    Err(RefinementError::Divergence {
                        candidate: slot.index,
                    })
                } else {
                    Ok(RefinedCoordinates {
                        coords: slot.best_positions[..slot.real_len].to_vec(),
                        initial_energy: slot.initial_energy,
                        final_energy: slot.best_energy,
                        steps: slot.steps,
                    })
                }
            })
            .collect()
    }

    /// Evaluates energy and gradient, optionally records the current
    /// coordinates as best, then applies one Adam update. Returns `true` when
    /// the slot stopped being active during this call.
    fn step(&self, slot: &mut CandidateSlot, evaluate: bool) -> bool {
        let cfg = &self.config;
        let real_len = slot.real_len;

        slot.gradient.iter_mut().for_each(|g| *g = Vector3::zeros());
        let term = self.energy.evaluate(
            &slot.positions[..real_len],
            &slot.chain_breaks,
            &mut slot.gradient[..real_len],
        );
        let energy = term.total();

        if !energy.is_finite() || slot.gradient.iter().any(|g| !g.iter().all(|v| v.is_finite())) {
            slot.diverged = true;
            return true;
        }

        if slot.steps == 0 {
            slot.initial_energy = energy;
        }

        if evaluate {
            if energy < slot.best_energy - cfg.min_delta {
                slot.stale_evaluations = 0;
            } else {
                slot.stale_evaluations += 1;
            }
            if energy < slot.best_energy {
                slot.best_energy = energy;
                slot.best_positions.copy_from_slice(&slot.positions);
            }
            if slot.stale_evaluations >= cfg.stop_patience {
                slot.frozen = true;
                return true;
            }
        }

        slot.steps += 1;
        let t = slot.steps as i32;
        let bias1 = 1.0 - ADAM_BETA1.powi(t);
        let bias2 = 1.0 - ADAM_BETA2.powi(t);

        for j in 0..real_len {
            if !slot.movable[j] {
                continue;
            }
            let g = slot.gradient[j];
            let m = &mut slot.first_moment[j];
            *m = *m * ADAM_BETA1 + g * (1.0 - ADAM_BETA1);
            let v = &mut slot.second_moment[j];
            *v = *v * ADAM_BETA2 + g.component_mul(&g) * (1.0 - ADAM_BETA2);

            let m_hat = slot.first_moment[j] / bias1;
            let v_hat = slot.second_moment[j] / bias2;
            let update = m_hat.zip_map(&v_hat, |m, v| m / (v.sqrt() + ADAM_EPSILON));
            slot.positions[j] -= update * cfg.learning_rate;
        }

        if slot.positions[..real_len].iter().any(|p| !p.iter().all(|v| v.is_finite())) {
            slot.diverged = true;
            return true;
        }
        false
    }

    /// Final evaluation after the last update.
    fn track_best(&self, slot: &mut CandidateSlot) {
        let energy = self
            .energy
            .energy(&slot.positions[..slot.real_len], &slot.chain_breaks)
            .total();
        if !energy.is_finite() {
            slot.diverged = true;
        } else if energy < slot.best_energy {
            slot.best_energy = energy;
            slot.best_positions.copy_from_slice(&slot.positions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::restraints::BackboneRestraints;
    use crate::core::forcefield::term::RestraintTerm;
    use crate::core::models::structure::test_utils::linear_structure;
    use crate::engine::config::RefinementConfigBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick_config() -> RefinementConfig {
        RefinementConfigBuilder::new()
            .batch_size(2)
            .num_epochs(400)
            .eval_interval(5)
            .stop_patience(5)
            .learning_rate(0.02)
            .build()
            .unwrap()
    }

    fn distorted_input(n: usize, moving: &[usize]) -> RefinementInput {
        let backbone = linear_structure(n).backbone().unwrap();
        let mut coords = backbone.coords;
        let mut residue_mask = vec![false; n];
        for &r in moving {
            residue_mask[r] = true;
            for k in 0..3 {
                coords[3 * r + k] += Vector3::new(0.3, -0.4, 0.5);
            }
        }
        RefinementInput {
            coords,
            atom_mask: crate::engine::mask::atom_mask_from_residue_mask(&residue_mask),
            chain_breaks: Vec::new(),
        }
    }

    /// Pulls every atom towards a target point; blows up for the candidate
    /// whose first atom sits at `poison_x`.
    struct Anchor {
        poison_x: f64,
    }

    impl ConstraintEnergy for Anchor {
        fn evaluate(
            &self,
            coords: &[Point3<f64>],
            _chain_breaks: &[usize],
            gradient: &mut [Vector3<f64>],
        ) -> RestraintTerm {
            if coords.first().is_some_and(|p| p.x == self.poison_x) {
                return RestraintTerm::new(f64::NAN, 0.0, 0.0);
            }
            let mut total = 0.0;
            for (p, g) in coords.iter().zip(gradient.iter_mut()) {
                let d = p.coords - Vector3::new(1.0, 1.0, 1.0);
                total += d.norm_squared();
                *g += d * 2.0;
            }
            RestraintTerm::new(total, 0.0, 0.0)
        }
    }

    #[test]
    fn fixed_atoms_are_unchanged_by_refinement() {
        let restraints = BackboneRestraints::default();
        let engine = RefinementEngine::new(quick_config(), &restraints).unwrap();
        let input = distorted_input(5, &[2]);

        let results = engine.refine(std::slice::from_ref(&input), &ProgressReporter::new());
        let refined = results[0].as_ref().unwrap();

        assert_eq!(refined.coords.len(), input.coords.len());
        for (j, (before, after)) in input.coords.iter().zip(&refined.coords).enumerate() {
            if !input.atom_mask[j] {
                assert_eq!(before, after, "fixed atom {j} moved");
            }
        }
        assert!(refined.final_energy <= refined.initial_energy);
    }

    #[test]
    fn refinement_lowers_the_energy_of_a_distorted_region() {
        let restraints = BackboneRestraints::default();
        let engine = RefinementEngine::new(quick_config(), &restraints).unwrap();
        let results = engine.refine(&[distorted_input(6, &[2, 3])], &ProgressReporter::new());
        let refined = results[0].as_ref().unwrap();
        assert!(refined.final_energy < refined.initial_energy);
    }

    #[test]
    fn divergence_is_isolated_to_one_candidate() {
        let energy = Anchor { poison_x: 42.0 };
        let engine = RefinementEngine::new(quick_config(), &energy).unwrap();

        let healthy = RefinementInput {
            coords: vec![Point3::new(3.0, 0.0, 0.0); 6],
            atom_mask: vec![true; 6],
            chain_breaks: Vec::new(),
        };
        let poisoned = RefinementInput {
            coords: vec![Point3::new(42.0, 0.0, 0.0); 3],
            atom_mask: vec![true; 3],
            chain_breaks: Vec::new(),
        };
        let results = engine.refine(
            &[healthy.clone(), poisoned, healthy],
            &ProgressReporter::new(),
        );

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(RefinementError::Divergence { candidate: 1 }));
        assert!(results[2].is_ok());
    }

    #[test]
    fn results_keep_submission_order_and_lengths() {
        let energy = Anchor { poison_x: f64::NAN };
        let engine = RefinementEngine::new(quick_config(), &energy).unwrap();
        let inputs: Vec<_> = [9, 3, 6, 12, 3]
            .iter()
            .map(|&len| RefinementInput {
                coords: vec![Point3::new(2.0, 2.0, 2.0); len],
                atom_mask: vec![true; len],
                chain_breaks: Vec::new(),
            })
            .collect();

        let results = engine.refine(&inputs, &ProgressReporter::new());
        let lengths: Vec<_> = results.iter().map(|r| r.as_ref().unwrap().coords.len()).collect();
        assert_eq!(lengths, vec![9, 3, 6, 12, 3]);
    }

    #[test]
    fn early_stopping_freezes_converged_candidates() {
        let energy = Anchor { poison_x: f64::NAN };
        let config = RefinementConfigBuilder::new()
            .num_epochs(100_000)
            .eval_interval(1)
            .stop_patience(3)
            .build()
            .unwrap();
        let engine = RefinementEngine::new(config, &energy).unwrap();
        let already_optimal = RefinementInput {
            coords: vec![Point3::new(1.0, 1.0, 1.0); 3],
            atom_mask: vec![true; 3],
            chain_breaks: Vec::new(),
        };

        let results = engine.refine(&[already_optimal], &ProgressReporter::new());
        assert!(results[0].as_ref().unwrap().steps < 10);
    }

    #[test]
    fn progress_reports_one_increment_per_candidate() {
        let energy = Anchor { poison_x: 42.0 };
        let engine = RefinementEngine::new(quick_config(), &energy).unwrap();
        let increments = AtomicUsize::new(0);
        let batches = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::TaskIncrement => {
                increments.fetch_add(1, Ordering::SeqCst);
            }
            Progress::BatchStart { .. } => {
                batches.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }));

        let inputs: Vec<_> = (0..3)
            .map(|i| RefinementInput {
                coords: vec![Point3::new(if i == 1 { 42.0 } else { 0.0 }, 0.0, 0.0); 3],
                atom_mask: vec![true; 3],
                chain_breaks: Vec::new(),
            })
            .collect();
        engine.refine(&inputs, &reporter);

        assert_eq!(increments.load(Ordering::SeqCst), 3);
        assert_eq!(batches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn padding_does_not_change_a_candidate_refined_in_a_batch() {
        let restraints = BackboneRestraints::default();
        let engine = RefinementEngine::new(quick_config(), &restraints).unwrap();
        let short = distorted_input(4, &[1, 2]);
        let long = distorted_input(9, &[3, 4, 5]);

        let alone = engine.refine(std::slice::from_ref(&short), &ProgressReporter::new());
        let batched = engine.refine(&[short.clone(), long], &ProgressReporter::new());

        let alone = alone[0].as_ref().unwrap();
        let batched = batched[0].as_ref().unwrap();
        assert_eq!(batched.coords.len(), short.coords.len());
        assert_eq!(alone.final_energy, batched.final_energy);
        assert_eq!(alone.initial_energy, batched.initial_energy);
        assert_eq!(alone.steps, batched.steps);
        assert_eq!(alone.coords, batched.coords);
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let energy = Anchor { poison_x: f64::NAN };
        let zero_interval = RefinementConfig {
            eval_interval: 0,
            ..quick_config()
        };
        assert!(RefinementEngine::new(zero_interval, &energy).is_err());
        let zero_batch = RefinementConfig {
            batch_size: 0,
            ..quick_config()
        };
        assert!(matches!(
            RefinementEngine::new(zero_batch, &energy),
            Err(ConfigError::InvalidParameter { name: "batch_size", .. })
        ));
    }

    #[test]
    fn inconsistent_input_fails_every_candidate() {
        let energy = Anchor { poison_x: f64::NAN };
        let engine = RefinementEngine::new(quick_config(), &energy).unwrap();
        let bad = RefinementInput {
            coords: vec![Point3::origin(); 3],
            atom_mask: vec![true; 2],
            chain_breaks: Vec::new(),
        };
        let results = engine.refine(&[bad], &ProgressReporter::new());
        assert!(matches!(results[0], Err(RefinementError::MaskLength { .. })));
    }
}
