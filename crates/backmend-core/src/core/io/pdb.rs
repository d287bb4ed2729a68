use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::{Atom, ResidueKey};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    /// Records preceding the first coordinate record, replayed verbatim.
    pub header_lines: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("").trim()
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_optional_float(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

/// Formats an atom name the way fixed-column files align it: names shorter
/// than four characters start in column 14.
fn padded_atom_name(name: &str) -> String {
    if name.len() >= 4 {
        name.to_string()
    } else {
        format!(" {:<3}", name)
    }
}

/// Reader and writer for the fixed-column PDB coordinate format.
///
/// Only the first model is read. Alternate locations other than blank or
/// `A` are skipped.
pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut atoms = Vec::new();
        let mut metadata = PdbMetadata::default();
        let mut seen_serials = HashSet::new();
        let mut in_coordinates = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    in_coordinates = true;
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    let alt_loc = slice_and_trim(&line, 16, 17);
                    if !alt_loc.is_empty() && alt_loc != "A" {
                        continue;
                    }

                    let serial_str = slice_and_trim(&line, 6, 11);
                    let name_str = slice_and_trim(&line, 12, 16);
                    let res_name_str = slice_and_trim(&line, 17, 20);
                    let chain_id_str = slice_and_trim(&line, 21, 22);
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let ins_code_str = slice_and_trim(&line, 26, 27);

                    if name_str.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    if !seen_serials.insert(serial) {
                        return Err(PdbError::Inconsistency(format!(
                            "Duplicate atom serial: {}",
                            serial
                        )));
                    }
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;

                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;

                    let chain_id = chain_id_str.chars().next().unwrap_or('A');
                    let insertion_code = ins_code_str.chars().next();
                    let residue = ResidueKey::new(chain_id, res_seq, insertion_code);

                    let mut atom = Atom::new(
                        serial,
                        name_str,
                        res_name_str,
                        residue,
                        Point3::new(x, y, z),
                    );
                    atom.occupancy = parse_optional_float(&line, 54, 60, 1.0);
                    atom.b_factor = parse_optional_float(&line, 60, 66, 0.0);
                    let element = slice_and_trim(&line, 76, 78);
                    if !element.is_empty() {
                        atom.element = element.to_string();
                    }
                    atom.hetero = record_type == "HETATM";
                    atoms.push(atom);
                }
                "ENDMDL" | "END" => {
                    if in_coordinates {
                        break;
                    }
                }
                "TER" | "MODEL" | "CONECT" | "MASTER" => {}
                _ => {
                    if !in_coordinates && !line.trim().is_empty() {
                        metadata.header_lines.push(line.clone());
                    }
                }
            }
        }

        if atoms.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok((Structure::new(atoms), metadata))
    }

    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header_lines {
            writeln!(writer, "{}", line)?;
        }

        let atoms = structure.atoms();
        for (i, atom) in atoms.iter().enumerate() {
            let record_type = if atom.hetero { "HETATM" } else { "ATOM" };
            writeln!(
                writer,
                "{:<6}{:>5} {:<4} {:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                record_type,
                atom.serial,
                padded_atom_name(&atom.name),
                atom.res_name,
                atom.residue.chain_id,
                atom.residue.number,
                atom.residue.insertion_code.unwrap_or(' '),
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.occupancy,
                atom.b_factor,
                atom.element,
            )?;

            let chain_ends = match atoms.get(i + 1) {
                Some(next) => next.residue.chain_id != atom.residue.chain_id || next.hetero,
                None => true,
            };
            if !atom.hetero && chain_ends {
                writeln!(writer, "TER")?;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }

    fn write_structure_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let metadata = PdbMetadata {
            header_lines: vec!["REMARK   1 GENERATED BY BACKMEND".to_string()],
        };
        Self::write_to(structure, &metadata, writer)
    }
}
