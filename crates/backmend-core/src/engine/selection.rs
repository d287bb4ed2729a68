use crate::core::forcefield::scoring::QualityScorer;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("There are no candidates to select from")]
    Empty,
    #[error("None of the {0} candidates could be scored")]
    NoScorableCandidates(usize),
    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: String,
        to: String,
        source: std::io::Error,
    },
}

/// The winning candidate and every candidate's score (`None` when scoring
/// failed).
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub score: f64,
    pub scores: Vec<Option<f64>>,
}

/// Index of the lowest score; ties go to the earliest candidate and `None`
/// entries are skipped.
pub fn select_from_scores(scores: Vec<Option<f64>>) -> Result<Selection, SelectionError> {
    if scores.is_empty() {
        return Err(SelectionError::Empty);
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        let Some(score) = *score else { continue };
        if best.is_none_or(|(_, b)| score < b) {
            best = Some((i, score));
        }
    }

    let (index, score) = best.ok_or(SelectionError::NoScorableCandidates(scores.len()))?;
    Ok(Selection {
        index,
        score,
        scores,
    })
}

fn score_one(scorer: &dyn QualityScorer, index: usize, structure: &Structure) -> Option<f64> {
    match scorer.score(structure) {
        Ok(score) if score.is_finite() => Some(score),
        Ok(score) => {
            warn!(candidate = index, score, "Discarding non-finite quality score.");
            None
        }
        Err(e) => {
            warn!(candidate = index, "Could not score candidate: {}", e);
            None
        }
    }
}

/// Scores every candidate and picks the lowest.
#[instrument(skip_all, name = "select_best", fields(candidates = candidates.len()))]
pub fn select_best(
    candidates: &[Structure],
    scorer: &dyn QualityScorer,
) -> Result<Selection, SelectionError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = candidates.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = candidates.par_iter().enumerate();

    let scores: Vec<Option<f64>> = iterator
        .map(|(i, structure)| score_one(scorer, i, structure))
        .collect();
    select_from_scores(scores)
}

/// Reads the candidate PDB files, picks the best and copies it to
/// `destination`, creating parent directories as needed. Unreadable files
/// count as unscorable.
#[instrument(skip_all, name = "select_and_copy", fields(destination = %destination.display()))]
pub fn select_and_copy(
    paths: &[PathBuf],
    scorer: &dyn QualityScorer,
    destination: &Path,
) -> Result<Selection, SelectionError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = paths.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = paths.par_iter().enumerate();

    let scores: Vec<Option<f64>> = iterator
        .map(|(i, path)| match PdbFile::read_structure(path) {
            Ok(structure) => score_one(scorer, i, &structure),
            Err(e) => {
                warn!(candidate = i, path = %path.display(), "Could not read candidate: {}", e);
                None
            }
        })
        .collect();

    let selection = select_from_scores(scores)?;
    let source = &paths[selection.index];

    let copy_err = |source_err| SelectionError::Copy {
        from: source.display().to_string(),
        to: destination.display().to_string(),
        source: source_err,
    };
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(source, destination).map_err(copy_err)?;

    info!(
        winner = %source.display(),
        score = selection.score,
        "Selected best candidate."
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::scoring::{GeometryScorer, ScoringError};
    use crate::core::models::structure::test_utils::linear_structure;
    use tempfile::tempdir;

    /// Scores a structure by looking up its residue count.
    struct ByLength(Vec<(usize, f64)>);

    impl QualityScorer for ByLength {
        fn score(&self, structure: &Structure) -> Result<f64, ScoringError> {
            let n = structure.ca_count();
            self.0
                .iter()
                .find(|(len, _)| *len == n)
                .map(|(_, s)| *s)
                .ok_or(ScoringError::EmptyBackbone)
        }
    }

    #[test]
    fn lowest_score_wins() {
        let selection = select_from_scores(vec![Some(3.1), Some(0.5), Some(2.2)]).unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.score, 0.5);
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        let selection = select_from_scores(vec![Some(2.0), Some(1.0), Some(1.0)]).unwrap();
        assert_eq!(selection.index, 1);
    }

    #[test]
    fn empty_candidate_list_is_an_error() {
        assert!(matches!(select_from_scores(Vec::new()), Err(SelectionError::Empty)));
        assert!(matches!(
            select_best(&[], &GeometryScorer::default()),
            Err(SelectionError::Empty)
        ));
    }

    #[test]
    fn failed_scores_are_skipped() {
        let scorer = ByLength(vec![(3, 3.1), (5, 2.2)]);
        let candidates = vec![linear_structure(3), linear_structure(4), linear_structure(5)];
        let selection = select_best(&candidates, &scorer).unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.scores, vec![Some(3.1), None, Some(2.2)]);
    }

    #[test]
    fn all_failed_scores_is_an_error() {
        let scorer = ByLength(Vec::new());
        let err = select_best(&[linear_structure(2)], &scorer).unwrap_err();
        assert!(matches!(err, SelectionError::NoScorableCandidates(1)));
    }

    #[test]
    fn non_finite_scores_are_skipped() {
        let scorer = ByLength(vec![(2, f64::NAN), (3, 7.0)]);
        let selection = select_best(&[linear_structure(2), linear_structure(3)], &scorer).unwrap();
        assert_eq!(selection.index, 1);
    }

    #[test]
    fn winner_is_copied_to_the_destination() {
        let dir = tempdir().unwrap();
        let scorer = ByLength(vec![(3, 3.1), (4, 0.5), (5, 2.2)]);
        let mut paths = Vec::new();
        for (i, n) in [3, 4, 5].into_iter().enumerate() {
            let path = dir.path().join(format!("generated_{i}.pdb"));
            PdbFile::write_structure(&linear_structure(n), &path).unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("missing.pdb"));

        let destination = dir.path().join("best_pdb").join("original_best.pdb");
        let selection = select_and_copy(&paths, &scorer, &destination).unwrap();

        assert_eq!(selection.index, 1);
        assert_eq!(selection.scores[3], None);
        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            fs::read_to_string(&paths[1]).unwrap()
        );
    }
}
