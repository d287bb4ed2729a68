use super::features::{AngleStatistics, FeatureBundle};
use super::mask::MissingMask;
use crate::core::backbone::angles::{AngleTable, NUM_ANGLES};
use crate::core::io::angles::{AngleTableError, read_angle_table};
use crate::core::utils::numeric::num_to_groups;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Angle table error: {0}")]
    Table(#[from] AngleTableError),
    #[error("Sampler was asked for {requested} more tables but only {available} remain")]
    Exhausted { requested: usize, available: usize },
    #[error("Sampled table {candidate} has {actual} rows, expected {expected}")]
    WrongLength {
        candidate: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Sampler returned {actual} tables for a batch of {expected}")]
    WrongCount { expected: usize, actual: usize },
    #[error("Request features have shape {actual:?}, expected {expected:?}")]
    RequestShape {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[error("Sampler backend failed: {0}")]
    Backend(String),
}

/// Everything a generative model needs to infill the missing residues of one
/// structure.
#[derive(Debug, Clone, Copy)]
pub struct SamplingRequest<'a> {
    pub stats: &'a AngleStatistics,
    pub real_len: usize,
    pub missing_mask: &'a MissingMask,
    pub features: &'a FeatureBundle,
    /// Total number of candidates wanted.
    pub n: usize,
    pub batch_size: usize,
    pub window_size: usize,
    pub window_step: usize,
    pub pad_len: usize,
    pub seed: u64,
}

/// The generative model seam.
///
/// `sample_batch` returns `count` angle tables in radians, one row per real
/// residue, with the known residues conditioned on the request features.
pub trait AngleSampler: Send + Sync {
    fn sample_batch(
        &self,
        request: &SamplingRequest<'_>,
        count: usize,
    ) -> Result<Vec<AngleTable>, SamplerError>;
}

/// Draws `request.n` tables from `sampler` in batches of at most
/// `request.batch_size`, checking the request features and every table's
/// length.
#[instrument(skip_all, name = "sample_candidates", fields(n = request.n))]
pub fn sample_candidates(
    sampler: &dyn AngleSampler,
    request: &SamplingRequest<'_>,
) -> Result<Vec<AngleTable>, SamplerError> {
    let expected = (1, request.pad_len, NUM_ANGLES);
    let actual = request.features.batched().dim();
    if actual != expected {
        return Err(SamplerError::RequestShape { expected, actual });
    }

    let groups = num_to_groups(request.n, request.batch_size);
    debug!(?groups, "Sampling in batches.");

    let mut tables = Vec::with_capacity(request.n);
    for count in groups {
        let batch = sampler.sample_batch(request, count)?;
        if batch.len() != count {
            return Err(SamplerError::WrongCount {
                expected: count,
                actual: batch.len(),
            });
        }
        for table in batch {
            if table.len() != request.real_len {
                return Err(SamplerError::WrongLength {
                    candidate: tables.len(),
                    expected: request.real_len,
                    actual: table.len(),
                });
            }
            tables.push(table);
        }
    }
    Ok(tables)
}

/// Serves angle tables generated ahead of time by an external model, read
/// from `generated_{i}.csv` or `generated_{i}.csv.gz` files in index order.
#[derive(Debug)]
pub struct PrecomputedSampler {
    paths: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl PrecomputedSampler {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_dir(dir: &Path) -> Result<Self, SamplerError> {
        let io_err = |source| SamplerError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut indexed = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if let Some(index) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(generated_index)
            {
                indexed.push((index, path));
            }
        }
        indexed.sort();
        info!(
            tables = indexed.len(),
            dir = %dir.display(),
            "Found precomputed angle tables."
        );
        Ok(Self::new(indexed.into_iter().map(|(_, p)| p).collect()))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn generated_index(file_name: &str) -> Option<usize> {
    let stem = file_name
        .strip_suffix(".csv.gz")
        .or_else(|| file_name.strip_suffix(".csv"))?;
    stem.strip_prefix("generated_")?.parse().ok()
}

impl AngleSampler for PrecomputedSampler {
    fn sample_batch(
        &self,
        _request: &SamplingRequest<'_>,
        count: usize,
    ) -> Result<Vec<AngleTable>, SamplerError> {
        let start = self.cursor.fetch_add(count, Ordering::SeqCst);
        let available = self.paths.len().saturating_sub(start);
        if count > available {
            return Err(SamplerError::Exhausted {
                requested: count,
                available,
            });
        }
        self.paths[start..start + count]
            .iter()
            .map(|path| read_angle_table(path).map_err(SamplerError::from))
            .collect()
    }
}
