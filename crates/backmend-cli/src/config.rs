use crate::cli::{CorrectArgs, InputArgs, RefineArgs, RefinementArgs};
use crate::error::{CliError, Result};
use backmend::core::forcefield::restraints::RestraintParams;
use backmend::core::forcefield::scoring::GeometryScorer;
use backmend::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialWindowConfig {
    size: Option<usize>,
    step: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSamplingConfig {
    num_candidates: Option<usize>,
    batch_size: Option<usize>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRefinementConfig {
    batch_size: Option<usize>,
    num_epochs: Option<usize>,
    stop_patience: Option<usize>,
    eval_interval: Option<usize>,
    learning_rate: Option<f64>,
    min_delta: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialScoringConfig {
    clash_distance: Option<f64>,
    clash_weight: Option<f64>,
}

/// The `--config` file. Every section and key is optional; missing values
/// fall back to CLI arguments and then to library defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialBackmendConfig {
    window: Option<PartialWindowConfig>,
    sampling: Option<PartialSamplingConfig>,
    refinement: Option<PartialRefinementConfig>,
    restraints: Option<RestraintParams>,
    scoring: Option<PartialScoringConfig>,
}

impl PartialBackmendConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the optional config file and applies `-S` overrides on top.
    pub fn load(path: Option<&Path>, set_values: &[String]) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_set_values(set_values)?;
        Ok(config)
    }

    pub fn window_config(&self, args: &InputArgs) -> Result<core_config::WindowConfig> {
        let file = self.window.as_ref();
        core_config::WindowConfig::new(
            args.window_size
                .or(file.and_then(|w| w.size))
                .unwrap_or(core_config::DEFAULT_WINDOW_SIZE),
            args.window_step
                .or(file.and_then(|w| w.step))
                .unwrap_or(core_config::DEFAULT_WINDOW_STEP),
        )
        .map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn refinement_config(&self, args: &RefinementArgs) -> Result<core_config::RefinementConfig> {
        let file = self.refinement.as_ref();
        let mut builder = core_config::RefinementConfigBuilder::new();
        if let Some(v) = args.refine_batch_size.or(file.and_then(|r| r.batch_size)) {
            builder = builder.batch_size(v);
        }
        if let Some(v) = args.num_epochs.or(file.and_then(|r| r.num_epochs)) {
            builder = builder.num_epochs(v);
        }
        if let Some(v) = file.and_then(|r| r.stop_patience) {
            builder = builder.stop_patience(v);
        }
        if let Some(v) = file.and_then(|r| r.eval_interval) {
            builder = builder.eval_interval(v);
        }
        if let Some(v) = args.learning_rate.or(file.and_then(|r| r.learning_rate)) {
            builder = builder.learning_rate(v);
        }
        if let Some(v) = file.and_then(|r| r.min_delta) {
            builder = builder.min_delta(v);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    /// Candidate count set by the config file or `-S`, if any.
    pub fn num_candidates(&self) -> Option<usize> {
        self.sampling.as_ref().and_then(|s| s.num_candidates)
    }

    pub fn restraint_params(&self) -> RestraintParams {
        self.restraints.unwrap_or_default()
    }

    pub fn scorer(&self) -> Result<GeometryScorer> {
        let defaults = GeometryScorer::default();
        let file = self.scoring.as_ref();
        let scorer = GeometryScorer {
            clash_distance: file
                .and_then(|s| s.clash_distance)
                .unwrap_or(defaults.clash_distance),
            clash_weight: file
                .and_then(|s| s.clash_weight)
                .unwrap_or(defaults.clash_weight),
        };
        if !(scorer.clash_distance.is_finite() && scorer.clash_distance >= 0.0) {
            return Err(CliError::Config(format!(
                "`scoring.clash-distance` must be a non-negative number, got {}",
                scorer.clash_distance
            )));
        }
        if !(scorer.clash_weight.is_finite() && scorer.clash_weight >= 0.0) {
            return Err(CliError::Config(format!(
                "`scoring.clash-weight` must be a non-negative number, got {}",
                scorer.clash_weight
            )));
        }
        Ok(scorer)
    }

    pub fn correction_config(&self, args: &CorrectArgs) -> Result<core_config::CorrectionConfig> {
        let window = self.window_config(&args.input)?;
        let sampling = self.sampling.as_ref();

        let mut builder = core_config::CorrectionConfigBuilder::new()
            .structure_path(args.input.input.clone())
            .missing_record_path(args.input.missing_record_path())
            .stats_path(args.input.stats.clone())
            .output_dir(args.output.output_dir.clone())
            .window_size(window.window_size)
            .window_step(window.window_step)
            .refinement(self.refinement_config(&args.refinement)?)
            .restraints(self.restraint_params());
        if let Some(n) = args.num_candidates.or(sampling.and_then(|s| s.num_candidates)) {
            builder = builder.num_candidates(n);
        }
        if let Some(size) = sampling.and_then(|s| s.batch_size) {
            builder = builder.sampling_batch_size(size);
        }
        if let Some(seed) = args.seed.or(sampling.and_then(|s| s.seed)) {
            builder = builder.seed(seed);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn refine_config(&self, args: &RefineArgs) -> Result<core_config::RefineConfig> {
        core_config::RefineConfigBuilder::new()
            .candidate_paths(args.candidates.clone())
            .missing_record_path(args.missing.clone())
            .output_dir(args.output.output_dir.clone())
            .refinement(self.refinement_config(&args.refinement)?)
            .restraints(self.restraint_params())
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();

            match key {
                "window.size" => self.window_mut().size = Some(parse_value(key, value_str)?),
                "window.step" => self.window_mut().step = Some(parse_value(key, value_str)?),
                "sampling.num-candidates" => {
                    self.sampling_mut().num_candidates = Some(parse_value(key, value_str)?)
                }
                "sampling.batch-size" => {
                    self.sampling_mut().batch_size = Some(parse_value(key, value_str)?)
                }
                "sampling.seed" => self.sampling_mut().seed = Some(parse_value(key, value_str)?),
                "refinement.batch-size" => {
                    self.refinement_mut().batch_size = Some(parse_value(key, value_str)?)
                }
                "refinement.num-epochs" => {
                    self.refinement_mut().num_epochs = Some(parse_value(key, value_str)?)
                }
                "refinement.stop-patience" => {
                    self.refinement_mut().stop_patience = Some(parse_value(key, value_str)?)
                }
                "refinement.eval-interval" => {
                    self.refinement_mut().eval_interval = Some(parse_value(key, value_str)?)
                }
                "refinement.learning-rate" => {
                    self.refinement_mut().learning_rate = Some(parse_value(key, value_str)?)
                }
                "refinement.min-delta" => {
                    self.refinement_mut().min_delta = Some(parse_value(key, value_str)?)
                }
                "restraints.bond-force-constant" => {
                    self.restraints_mut().bond_force_constant = parse_value(key, value_str)?
                }
                "restraints.angle-force-constant" => {
                    self.restraints_mut().angle_force_constant = parse_value(key, value_str)?
                }
                "restraints.angle-tolerance" => {
                    self.restraints_mut().angle_tolerance = parse_value(key, value_str)?
                }
                "restraints.clash-force-constant" => {
                    self.restraints_mut().clash_force_constant = parse_value(key, value_str)?
                }
                "restraints.clash-distance" => {
                    self.restraints_mut().clash_distance = parse_value(key, value_str)?
                }
                "scoring.clash-distance" => {
                    self.scoring_mut().clash_distance = Some(parse_value(key, value_str)?)
                }
                "scoring.clash-weight" => {
                    self.scoring_mut().clash_weight = Some(parse_value(key, value_str)?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn window_mut(&mut self) -> &mut PartialWindowConfig {
        self.window.get_or_insert_with(Default::default)
    }

    fn sampling_mut(&mut self) -> &mut PartialSamplingConfig {
        self.sampling.get_or_insert_with(Default::default)
    }

    fn refinement_mut(&mut self) -> &mut PartialRefinementConfig {
        self.refinement.get_or_insert_with(Default::default)
    }

    fn restraints_mut(&mut self) -> &mut RestraintParams {
        self.restraints.get_or_insert_with(Default::default)
    }

    fn scoring_mut(&mut self) -> &mut PartialScoringConfig {
        self.scoring.get_or_insert_with(Default::default)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}
