use crate::core::forcefield::restraints::RestraintParams;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub const DEFAULT_WINDOW_SIZE: usize = 128;
pub const DEFAULT_WINDOW_STEP: usize = 32;
pub const DEFAULT_NUM_CANDIDATES: usize = 10;
pub const DEFAULT_SAMPLING_BATCH_SIZE: usize = 512;
pub const DEFAULT_REFINEMENT_BATCH_SIZE: usize = 16;
pub const DEFAULT_NUM_EPOCHS: usize = 30_000;
pub const DEFAULT_STOP_PATIENCE: usize = 10;
pub const DEFAULT_EVAL_INTERVAL: usize = 10;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_MIN_DELTA: f64 = 1e-4;

fn positive(name: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}

fn positive_finite(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a positive finite number, got {}", value),
        })
    }
}

fn non_negative_finite(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a non-negative finite number, got {}", value),
        })
    }
}

/// Window geometry of the generative model; it determines the padded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub window_size: usize,
    pub window_step: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            window_step: DEFAULT_WINDOW_STEP,
        }
    }
}

impl WindowConfig {
    pub fn new(window_size: usize, window_step: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            window_size: positive("window_size", window_size)?,
            window_step: positive("window_step", window_step)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub num_candidates: usize,
    pub batch_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementConfig {
    pub batch_size: usize,
    pub num_epochs: usize,
    pub stop_patience: usize,
    pub eval_interval: usize,
    pub learning_rate: f64,
    pub min_delta: f64,
}

impl RefinementConfig {
    /// Checks the invariants the builder enforces, for values assembled
    /// directly from the public fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("batch_size", self.batch_size)?;
        positive("num_epochs", self.num_epochs)?;
        positive("stop_patience", self.stop_patience)?;
        positive("eval_interval", self.eval_interval)?;
        positive_finite("learning_rate", self.learning_rate)?;
        non_negative_finite("min_delta", self.min_delta)?;
        Ok(())
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_REFINEMENT_BATCH_SIZE,
            num_epochs: DEFAULT_NUM_EPOCHS,
            stop_patience: DEFAULT_STOP_PATIENCE,
            eval_interval: DEFAULT_EVAL_INTERVAL,
            learning_rate: DEFAULT_LEARNING_RATE,
            min_delta: DEFAULT_MIN_DELTA,
        }
    }
}

#[derive(Default)]
pub struct RefinementConfigBuilder {
    batch_size: Option<usize>,
    num_epochs: Option<usize>,
    stop_patience: Option<usize>,
    eval_interval: Option<usize>,
    learning_rate: Option<f64>,
    min_delta: Option<f64>,
}

impl RefinementConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }
    pub fn num_epochs(mut self, epochs: usize) -> Self {
        self.num_epochs = Some(epochs);
        self
    }
    pub fn stop_patience(mut self, patience: usize) -> Self {
        self.stop_patience = Some(patience);
        self
    }
    pub fn eval_interval(mut self, interval: usize) -> Self {
        self.eval_interval = Some(interval);
        self
    }
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = Some(rate);
        self
    }
    pub fn min_delta(mut self, delta: f64) -> Self {
        self.min_delta = Some(delta);
        self
    }

    pub fn build(self) -> Result<RefinementConfig, ConfigError> {
        let config = RefinementConfig {
            batch_size: self.batch_size.unwrap_or(DEFAULT_REFINEMENT_BATCH_SIZE),
            num_epochs: self.num_epochs.unwrap_or(DEFAULT_NUM_EPOCHS),
            stop_patience: self.stop_patience.unwrap_or(DEFAULT_STOP_PATIENCE),
            eval_interval: self.eval_interval.unwrap_or(DEFAULT_EVAL_INTERVAL),
            learning_rate: self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            min_delta: self.min_delta.unwrap_or(DEFAULT_MIN_DELTA),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Everything the end-to-end correction workflow needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionConfig {
    pub structure_path: PathBuf,
    pub missing_record_path: PathBuf,
    pub stats_path: PathBuf,
    pub output_dir: PathBuf,
    pub window: WindowConfig,
    pub sampling: SamplingConfig,
    pub refinement: RefinementConfig,
    pub restraints: RestraintParams,
}

#[derive(Default)]
pub struct CorrectionConfigBuilder {
    structure_path: Option<PathBuf>,
    missing_record_path: Option<PathBuf>,
    stats_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    window_size: Option<usize>,
    window_step: Option<usize>,
    num_candidates: Option<usize>,
    sampling_batch_size: Option<usize>,
    seed: Option<u64>,
    refinement: Option<RefinementConfig>,
    restraints: Option<RestraintParams>,
}

impl CorrectionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structure_path(mut self, path: PathBuf) -> Self {
        self.structure_path = Some(path);
        self
    }
    pub fn missing_record_path(mut self, path: PathBuf) -> Self {
        self.missing_record_path = Some(path);
        self
    }
    pub fn stats_path(mut self, path: PathBuf) -> Self {
        self.stats_path = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }
    pub fn window_step(mut self, step: usize) -> Self {
        self.window_step = Some(step);
        self
    }
    pub fn num_candidates(mut self, n: usize) -> Self {
        self.num_candidates = Some(n);
        self
    }
    pub fn sampling_batch_size(mut self, size: usize) -> Self {
        self.sampling_batch_size = Some(size);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn refinement(mut self, config: RefinementConfig) -> Self {
        self.refinement = Some(config);
        self
    }
    pub fn restraints(mut self, params: RestraintParams) -> Self {
        self.restraints = Some(params);
        self
    }

    pub fn build(self) -> Result<CorrectionConfig, ConfigError> {
        let window = WindowConfig::new(
            self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE),
            self.window_step.unwrap_or(DEFAULT_WINDOW_STEP),
        )?;
        let sampling = SamplingConfig {
            num_candidates: positive(
                "num_candidates",
                self.num_candidates.unwrap_or(DEFAULT_NUM_CANDIDATES),
            )?,
            batch_size: positive(
                "sampling_batch_size",
                self.sampling_batch_size.unwrap_or(DEFAULT_SAMPLING_BATCH_SIZE),
            )?,
            seed: self.seed.unwrap_or(0),
        };
        Ok(CorrectionConfig {
            structure_path: self
                .structure_path
                .ok_or(ConfigError::MissingParameter("structure_path"))?,
            missing_record_path: self
                .missing_record_path
                .ok_or(ConfigError::MissingParameter("missing_record_path"))?,
            stats_path: self
                .stats_path
                .ok_or(ConfigError::MissingParameter("stats_path"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            window,
            sampling,
            refinement: self.refinement.unwrap_or_default(),
            restraints: self.restraints.unwrap_or_default(),
        })
    }
}

/// Configuration of the refine-only workflow over existing candidate files.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineConfig {
    pub candidate_paths: Vec<PathBuf>,
    pub missing_record_path: PathBuf,
    pub output_dir: PathBuf,
    pub refinement: RefinementConfig,
    pub restraints: RestraintParams,
}

#[derive(Default)]
pub struct RefineConfigBuilder {
    candidate_paths: Vec<PathBuf>,
    missing_record_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    refinement: Option<RefinementConfig>,
    restraints: Option<RestraintParams>,
}

impl RefineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidate_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.candidate_paths = paths;
        self
    }
    pub fn missing_record_path(mut self, path: PathBuf) -> Self {
        self.missing_record_path = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn refinement(mut self, config: RefinementConfig) -> Self {
        self.refinement = Some(config);
        self
    }
    pub fn restraints(mut self, params: RestraintParams) -> Self {
        self.restraints = Some(params);
        self
    }

    pub fn build(self) -> Result<RefineConfig, ConfigError> {
        if self.candidate_paths.is_empty() {
            return Err(ConfigError::MissingParameter("candidate_paths"));
        }
        Ok(RefineConfig {
            candidate_paths: self.candidate_paths,
            missing_record_path: self
                .missing_record_path
                .ok_or(ConfigError::MissingParameter("missing_record_path"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            refinement: self.refinement.unwrap_or_default(),
            restraints: self.restraints.unwrap_or_default(),
        })
    }
}
