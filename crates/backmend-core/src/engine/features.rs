use crate::core::backbone::angles::{ANGLE_NAMES, NUM_ANGLES, canonical_angles};
use crate::core::models::structure::{Structure, StructureError};
use crate::core::utils::numeric::wrap_array;
use nalgebra::Point3;
use ndarray::{Array1, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),
    #[error("Could not compute backbone angles from the structure")]
    NoAngles,
    #[error("Structure has {real_len} residues but the padded length is only {pad_len}")]
    TooLong { real_len: usize, pad_len: usize },
    #[error("Inconsistent feature bundle: {0}")]
    Shape(String),
    #[error("File I/O error for '{path}': {source}")]
    StatsIo {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    StatsJson {
        path: String,
        source: serde_json::Error,
    },
    #[error("Angle statistics provide {actual} means, expected {expected}")]
    StatsLength { expected: usize, actual: usize },
    #[error("Angle statistics have no mean for '{0}'")]
    StatsMissingFeature(&'static str),
}

/// Per-channel statistics of the training distribution of the sampler.
///
/// Serialized as `{"masked_means": [..6 floats..]}`. When `feature_names` is
/// present the means are matched to channels by name instead of position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleStatistics {
    pub masked_means: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl AngleStatistics {
    pub fn new(masked_means: [f64; NUM_ANGLES]) -> Self {
        Self {
            masked_means: masked_means.to_vec(),
            feature_names: None,
        }
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self, FeatureError> {
        let stats: Self = serde_json::from_reader(reader).map_err(|source| FeatureError::StatsJson {
            path: source_name.to_string(),
            source,
        })?;
        stats.means()?;
        Ok(stats)
    }

    pub fn load(path: &Path) -> Result<Self, FeatureError> {
        let path_str = path.display().to_string();
        let file = File::open(path).map_err(|source| FeatureError::StatsIo {
            path: path_str.clone(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), &path_str)
    }

    /// Means in canonical channel order.
    pub fn means(&self) -> Result<[f64; NUM_ANGLES], FeatureError> {
        match &self.feature_names {
            None => {
                if self.masked_means.len() != NUM_ANGLES {
                    return Err(FeatureError::StatsLength {
                        expected: NUM_ANGLES,
                        actual: self.masked_means.len(),
                    });
                }
                let mut means = [0.0; NUM_ANGLES];
                means.copy_from_slice(&self.masked_means);
                Ok(means)
            }
            Some(names) => {
                if names.len() != self.masked_means.len() {
                    return Err(FeatureError::StatsLength {
                        expected: names.len(),
                        actual: self.masked_means.len(),
                    });
                }
                let mut means = [0.0; NUM_ANGLES];
                for (slot, channel) in means.iter_mut().zip(ANGLE_NAMES) {
                    let idx = names
                        .iter()
                        .position(|n| n == channel)
                        .ok_or(FeatureError::StatsMissingFeature(channel))?;
                    *slot = self.masked_means[idx];
                }
                Ok(means)
            }
        }
    }
}

/// Model input for one structure: padded, mean-shifted and wrapped angles
/// with their attention mask and the original backbone coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBundle {
    angles: Array2<f32>,
    attention_mask: Array1<bool>,
    coordinates: Vec<Point3<f64>>,
    real_len: usize,
    pad_len: usize,
}

impl FeatureBundle {
    /// Validates and assembles a bundle.
    ///
    /// `angles` must be `(pad_len, 6)`, `attention_mask` must have `pad_len`
    /// entries whose `true` values are exactly the leading `real_len`
    /// positions, and `coordinates` must hold three points per real residue.
    pub fn new(
        angles: Array2<f32>,
        attention_mask: Array1<bool>,
        coordinates: Vec<Point3<f64>>,
        real_len: usize,
    ) -> Result<Self, FeatureError> {
        let pad_len = angles.nrows();
        if angles.ncols() != NUM_ANGLES {
            return Err(FeatureError::Shape(format!(
                "angles have {} channels, expected {}",
                angles.ncols(),
                NUM_ANGLES
            )));
        }
        if attention_mask.len() != pad_len {
            return Err(FeatureError::Shape(format!(
                "attention mask has {} entries for {} rows",
                attention_mask.len(),
                pad_len
            )));
        }
        if real_len > pad_len {
            return Err(FeatureError::TooLong { real_len, pad_len });
        }
        if attention_mask.iter().enumerate().any(|(i, m)| *m != (i < real_len)) {
            return Err(FeatureError::Shape(format!(
                "attention mask must cover exactly the first {} positions",
                real_len
            )));
        }
        if coordinates.len() != 3 * real_len {
            return Err(FeatureError::Shape(format!(
                "{} backbone coordinates for {} residues",
                coordinates.len(),
                real_len
            )));
        }
        Ok(Self {
            angles,
            attention_mask,
            coordinates,
            real_len,
            pad_len,
        })
    }

    pub fn angles(&self) -> &Array2<f32> {
        &self.angles
    }

    /// The angles with a leading batch axis, shape `(1, pad_len, 6)`.
    pub fn batched(&self) -> ArrayView3<'_, f32> {
        self.angles.view().insert_axis(Axis(0))
    }

    pub fn attention_mask(&self) -> &Array1<bool> {
        &self.attention_mask
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub fn real_len(&self) -> usize {
        self.real_len
    }

    pub fn pad_len(&self) -> usize {
        self.pad_len
    }
}

/// Real length implied by an attention mask: one past the last attended
/// position, or zero for an empty mask.
pub fn real_len_from_attention_mask(mask: &Array1<bool>) -> usize {
    mask.iter().rposition(|m| *m).map_or(0, |last| last + 1)
}

/// Builds the model input for `structure`.
///
/// Canonical angles are shifted by the training means, wrapped to
/// `[-PI, PI)`, zero-padded to `pad_len` rows, stripped of NaN and stored as
/// `f32`.
#[instrument(skip_all, name = "align_features")]
pub fn align_features(
    structure: &Structure,
    stats: &AngleStatistics,
    pad_len: usize,
) -> Result<FeatureBundle, FeatureError> {
    let backbone = structure.backbone()?;
    let table = canonical_angles(&backbone).ok_or(FeatureError::NoAngles)?;
    let real_len = table.len();
    if real_len > pad_len {
        return Err(FeatureError::TooLong { real_len, pad_len });
    }

    let means = stats.means()?;
    let mut shifted = table.to_array();
    for mut row in shifted.axis_iter_mut(Axis(0)) {
        for (value, mean) in row.iter_mut().zip(means) {
            *value -= mean;
        }
    }
    wrap_array(&mut shifted, -PI, PI);

    let mut angles = Array2::<f32>::zeros((pad_len, NUM_ANGLES));
    for ((i, j), value) in shifted.indexed_iter() {
        if !value.is_nan() {
            angles[[i, j]] = *value as f32;
        }
    }

    let attention_mask = Array1::from_shape_fn(pad_len, |i| i < real_len);
    debug!(real_len, pad_len, "Aligned angle features.");

    FeatureBundle::new(angles, attention_mask, backbone.coords, real_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backbone::angles::{PHI, PSI, TAU};
    use crate::core::models::structure::test_utils::linear_structure;
    use crate::core::utils::numeric::modulo_with_wrapped_range;

    fn zero_stats() -> AngleStatistics {
        AngleStatistics::new([0.0; NUM_ANGLES])
    }

    #[test]
    fn features_are_padded_and_masked() {
        let bundle = align_features(&linear_structure(4), &zero_stats(), 160).unwrap();

        assert_eq!(bundle.angles().dim(), (160, 6));
        assert_eq!(bundle.batched().dim(), (1, 160, 6));
        assert_eq!(bundle.real_len(), 4);
        assert_eq!(bundle.pad_len(), 160);
        assert_eq!(bundle.attention_mask().iter().filter(|m| **m).count(), 4);
        assert_eq!(real_len_from_attention_mask(bundle.attention_mask()), 4);
        assert_eq!(bundle.coordinates().len(), 12);
        assert!(bundle.angles().rows().into_iter().skip(4).all(|r| r.iter().all(|v| *v == 0.0)));
    }

    #[test]
    fn undefined_angles_become_zero() {
        let bundle = align_features(&linear_structure(3), &zero_stats(), 64).unwrap();
        assert!(bundle.angles().iter().all(|v| v.is_finite()));
        assert_eq!(bundle.angles()[[0, PHI]], 0.0);
        assert_eq!(bundle.angles()[[2, PSI]], 0.0);
    }

    #[test]
    fn means_are_subtracted_before_wrapping() {
        let structure = linear_structure(3);
        let table = canonical_angles(&structure.backbone().unwrap()).unwrap();
        let mean_tau = 2.5;
        let stats = AngleStatistics::new([0.0, 0.0, 0.0, mean_tau, 0.0, 0.0]);

        let bundle = align_features(&structure, &stats, 64).unwrap();
        let expected = modulo_with_wrapped_range(table.rows()[1][TAU] - mean_tau, -PI, PI);
        assert!((bundle.angles()[[1, TAU]] as f64 - expected).abs() < 1e-6);
        let bound = PI as f32;
        assert!(bundle.angles().iter().all(|v| *v >= -bound && *v <= bound));
    }

    #[test]
    fn structure_longer_than_pad_len_is_rejected() {
        let err = align_features(&linear_structure(5), &zero_stats(), 4).unwrap_err();
        assert!(matches!(err, FeatureError::TooLong { real_len: 5, pad_len: 4 }));
    }

    #[test]
    fn structure_without_backbone_has_no_angles() {
        let err = align_features(&Structure::default(), &zero_stats(), 32).unwrap_err();
        assert!(matches!(err, FeatureError::NoAngles));
    }

    #[test]
    fn statistics_are_matched_by_feature_name() {
        let json = r#"{
            "masked_means": [6, 5, 4, 3, 2, 1],
            "feature_names": ["C:1N:1CA", "CA:C:1N", "tau", "omega", "psi", "phi"]
        }"#;
        let stats = AngleStatistics::from_reader(json.as_bytes(), "inline").unwrap();
        assert_eq!(stats.means().unwrap(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn statistics_with_wrong_length_are_rejected() {
        let json = r#"{"masked_means": [0.1, 0.2]}"#;
        let err = AngleStatistics::from_reader(json.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, FeatureError::StatsLength { expected: 6, actual: 2 }));
    }

    #[test]
    fn bundle_rejects_a_mask_with_gaps() {
        let mask = Array1::from(vec![true, false, true, false]);
        let coords = vec![Point3::origin(); 6];
        let err = FeatureBundle::new(Array2::zeros((4, 6)), mask, coords, 2).unwrap_err();
        assert!(matches!(err, FeatureError::Shape(_)));
    }
}
