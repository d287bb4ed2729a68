use crate::core::backbone::angles::{ANGLE_NAMES, AngleTable, NUM_ANGLES};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AngleTableError {
    #[error("File I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Angle table '{path}' has no '{column}' column")]
    MissingColumn { path: String, column: &'static str },
    #[error("Angle table '{path}', row {row}: invalid '{column}' value '{value}'")]
    InvalidValue {
        path: String,
        row: usize,
        column: &'static str,
        value: String,
    },
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Writes an angle table as CSV with a leading unnamed index column.
///
/// NaN cells are written empty. The file is gzip-compressed when `path`
/// ends in `.gz`.
pub fn write_angle_table(table: &AngleTable, path: &Path) -> Result<(), AngleTableError> {
    let path_str = path.display().to_string();
    let io_err = |source| AngleTableError::Io {
        path: path_str.clone(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_angle_table_to(table, &mut encoder).map_err(|source| AngleTableError::Csv {
            path: path_str.clone(),
            source,
        })?;
        encoder.finish().and_then(|mut w| w.flush()).map_err(io_err)?;
    } else {
        let mut writer = BufWriter::new(file);
        write_angle_table_to(table, &mut writer).map_err(|source| AngleTableError::Csv {
            path: path_str.clone(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
    }
    Ok(())
}

pub fn write_angle_table_to<W: Write>(table: &AngleTable, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(std::iter::once("").chain(ANGLE_NAMES))?;

    for (i, row) in table.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(NUM_ANGLES + 1);
        record.push(i.to_string());
        record.extend(row.iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads an angle table written by [`write_angle_table`] or by any tool that
/// emits the six named angle columns. Extra columns (such as the index) are
/// ignored; empty and `nan` cells read as NaN.
pub fn read_angle_table(path: &Path) -> Result<AngleTable, AngleTableError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| AngleTableError::Io {
        path: path_str.clone(),
        source,
    })?;

    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    read_angle_table_from(reader, &path_str)
}

pub fn read_angle_table_from<R: Read>(reader: R, source_name: &str) -> Result<AngleTable, AngleTableError> {
    let csv_err = |source| AngleTableError::Csv {
        path: source_name.to_string(),
        source,
    };
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader.headers().map_err(csv_err)?.clone();
    let mut columns = [0usize; NUM_ANGLES];
    for (slot, name) in columns.iter_mut().zip(ANGLE_NAMES) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| AngleTableError::MissingColumn {
                path: source_name.to_string(),
                column: name,
            })?;
    }

    let mut rows = Vec::new();
    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let mut row = [f64::NAN; NUM_ANGLES];
        for (channel, &column) in columns.iter().enumerate() {
            let raw = record.get(column).unwrap_or("").trim();
            row[channel] = parse_cell(raw).ok_or_else(|| AngleTableError::InvalidValue {
                path: source_name.to_string(),
                row: row_idx,
                column: ANGLE_NAMES[channel],
                value: raw.to_string(),
            })?;
        }
        rows.push(row);
    }

    Ok(AngleTable::new(rows))
}

fn parse_cell(raw: &str) -> Option<f64> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        raw.parse().ok()
    }
}
