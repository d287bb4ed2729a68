use super::refinement::{RefinementError, RefinementInput};
use crate::core::utils::numeric::num_to_groups;
use nalgebra::{Point3, Vector3};
use ndarray::Array2;
use std::ops::Range;

/// All refinement inputs padded to the longest one.
///
/// Positions beyond a candidate's real length are the origin and are never
/// movable; `pad_mask` marks the real positions.
#[derive(Debug, Clone)]
pub struct PaddedSet {
    coords: Vec<Vec<Point3<f64>>>,
    atom_mask: Array2<bool>,
    pad_mask: Array2<bool>,
    lengths: Vec<usize>,
    chain_breaks: Vec<Vec<usize>>,
}

impl PaddedSet {
    pub fn new(inputs: &[RefinementInput]) -> Result<Self, RefinementError> {
        for (candidate, input) in inputs.iter().enumerate() {
            if input.atom_mask.len() != input.coords.len() {
                return Err(RefinementError::MaskLength {
                    candidate,
                    coords: input.coords.len(),
                    mask: input.atom_mask.len(),
                });
            }
        }

        let lengths: Vec<usize> = inputs.iter().map(|i| i.coords.len()).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let coords = inputs
            .iter()
            .map(|input| {
                let mut padded = input.coords.clone();
                padded.resize(max_len, Point3::origin());
                padded
            })
            .collect();
        let atom_mask = Array2::from_shape_fn((inputs.len(), max_len), |(c, j)| {
            inputs[c].atom_mask.get(j).copied().unwrap_or(false)
        });
        let pad_mask = Array2::from_shape_fn((inputs.len(), max_len), |(c, j)| j < lengths[c]);

        Ok(Self {
            coords,
            atom_mask,
            pad_mask,
            lengths,
            chain_breaks: inputs.iter().map(|i| i.chain_breaks.clone()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.pad_mask.ncols()
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Candidate index ranges of consecutive batches of at most `batch_size`.
    pub fn batch_ranges(&self, batch_size: usize) -> Vec<Range<usize>> {
        let mut start = 0;
        num_to_groups(self.len(), batch_size)
            .into_iter()
            .map(|size| {
                let range = start..start + size;
                start += size;
                range
            })
            .collect()
    }

    /// Working buffers for the candidates in `range`, cropped to the longest
    /// real length inside the batch.
    pub fn batch(&self, range: Range<usize>) -> BatchBuffers {
        let length = self.lengths[range.clone()].iter().copied().max().unwrap_or(0);
        let slots = range
            .clone()
            .map(|c| {
                let positions = self.coords[c][..length].to_vec();
                let movable = (0..length)
                    .map(|j| self.atom_mask[[c, j]] && self.pad_mask[[c, j]])
                    .collect();
                CandidateSlot::new(
                    c,
                    positions,
                    movable,
                    self.lengths[c],
                    self.chain_breaks[c].clone(),
                )
            })
            .collect();
        BatchBuffers {
            offset: range.start,
            length,
            slots,
        }
    }
}

/// Optimization state of one candidate inside a batch.
#[derive(Debug, Clone)]
pub struct CandidateSlot {
    pub index: usize,
    pub positions: Vec<Point3<f64>>,
    pub movable: Vec<bool>,
    pub real_len: usize,
    pub chain_breaks: Vec<usize>,
    pub gradient: Vec<Vector3<f64>>,
    pub first_moment: Vec<Vector3<f64>>,
    pub second_moment: Vec<Vector3<f64>>,
    pub best_positions: Vec<Point3<f64>>,
    pub initial_energy: f64,
    pub best_energy: f64,
    pub stale_evaluations: usize,
    pub steps: usize,
    pub frozen: bool,
    pub diverged: bool,
}

impl CandidateSlot {
    fn new(
        index: usize,
        positions: Vec<Point3<f64>>,
        movable: Vec<bool>,
        real_len: usize,
        chain_breaks: Vec<usize>,
    ) -> Self {
        let length = positions.len();
        Self {
            index,
            best_positions: positions.clone(),
            positions,
            movable,
            real_len,
            chain_breaks,
            gradient: vec![Vector3::zeros(); length],
            first_moment: vec![Vector3::zeros(); length],
            second_moment: vec![Vector3::zeros(); length],
            initial_energy: f64::INFINITY,
            best_energy: f64::INFINITY,
            stale_evaluations: 0,
            steps: 0,
            frozen: false,
            diverged: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.frozen && !self.diverged
    }
}

/// Per-batch working memory. Dropping it releases every buffer of the batch.
#[derive(Debug)]
pub struct BatchBuffers {
    pub offset: usize,
    pub length: usize,
    pub slots: Vec<CandidateSlot>,
}

impl BatchBuffers {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn all_settled(&self) -> bool {
        self.slots.iter().all(|s| !s.is_active())
    }
}
