use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// A residue identifier as it appears in a missing-residue record: a plain
/// residue number, or a string carrying an insertion code such as `"52A"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResidueLabel {
    Number(i64),
    Text(String),
}

impl fmt::Display for ResidueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResidueLabel::Number(n) => write!(f, "{}", n),
            ResidueLabel::Text(s) => f.write_str(s),
        }
    }
}

/// Which residues are missing, per chain, and where each residue label sits
/// in the flattened residue order of the structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingInfoRecord {
    pub missing_residues_id: BTreeMap<String, Vec<ResidueLabel>>,
    pub index_mapping: BTreeMap<String, BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_indexes: Option<BTreeMap<String, usize>>,
}

impl MissingInfoRecord {
    /// Total number of residue ids flagged as missing.
    pub fn missing_count(&self) -> usize {
        self.missing_residues_id.values().map(Vec::len).sum()
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self, RecordError> {
        serde_json::from_reader(reader).map_err(|source| RecordError::Json {
            path: source_name.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let path_str = path.display().to_string();
        let file = File::open(path).map_err(|source| RecordError::Io {
            path: path_str.clone(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), &path_str)
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        let path_str = path.display().to_string();
        let io_err = |source| RecordError::Io {
            path: path_str.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| RecordError::Json {
            path: path_str.clone(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }
}
