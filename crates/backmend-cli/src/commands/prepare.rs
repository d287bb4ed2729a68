use crate::cli::PrepareArgs;
use crate::config::PartialBackmendConfig;
use crate::error::{CliError, Result};
use crate::utils::output::{ensure_outside_output, prepare_output_dir};
use backmend::core::backbone::angles::AngleTable;
use backmend::core::io::angles::write_angle_table;
use backmend::engine::error::EngineError;
use backmend::workflows::correct::{PreparedInput, prepare};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FEATURES_FILE: &str = "features.csv";
pub const SUMMARY_FILE: &str = "prepare.json";
pub const RECORD_FILE: &str = "missing.json";

/// Everything an external sampler needs besides the feature table.
#[derive(Debug, Serialize)]
struct PrepareSummary<'a> {
    structure: &'a Path,
    missing_record: &'a Path,
    real_len: usize,
    pad_len: usize,
    window_size: usize,
    window_step: usize,
    /// Zero-based positions flagged as missing.
    missing_positions: Vec<usize>,
    features: &'static str,
    /// Copy of the missing-residue record next to the features.
    record: &'static str,
}

pub fn run(args: PrepareArgs) -> Result<()> {
    let partial =
        PartialBackmendConfig::load(args.output.config.as_deref(), &args.output.set_values)?;
    let window = partial.window_config(&args.input)?;
    let missing_record = args.input.missing_record_path();
    ensure_outside_output(
        &args.output.output_dir,
        &[
            ("Structure", args.input.input.as_path()),
            ("Missing-residue record", missing_record.as_path()),
            ("Angle statistics", args.input.stats.as_path()),
        ],
    )?;

    let prepared = prepare(
        &args.input.input,
        &missing_record,
        &args.input.stats,
        window.window_size,
        window.window_step,
    )?;

    prepare_output_dir(&args.output.output_dir, args.output.force)?;
    let features_path = write_features(&prepared, &args.output.output_dir)?;
    prepared
        .record
        .save(&args.output.output_dir.join(RECORD_FILE))
        .map_err(EngineError::from)?;

    let summary = PrepareSummary {
        structure: &args.input.input,
        missing_record: &missing_record,
        real_len: prepared.real_len(),
        pad_len: prepared.pad_len(),
        window_size: window.window_size,
        window_step: window.window_step,
        missing_positions: (0..prepared.pad_len())
            .filter(|&i| prepared.mask.is_missing(i))
            .collect(),
        features: FEATURES_FILE,
        record: RECORD_FILE,
    };
    let summary_path = args.output.output_dir.join(SUMMARY_FILE);
    let file = File::create(&summary_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &summary).map_err(|e| {
        CliError::Other(anyhow::anyhow!(
            "Failed to write summary {:?}: {}",
            summary_path,
            e
        ))
    })?;

    info!(
        "Prepared {} residues ({} missing) padded to {}.",
        summary.real_len,
        summary.missing_positions.len(),
        summary.pad_len
    );
    println!(
        "✓ Features written to {} (real length {}, padded length {}, {} missing).",
        features_path.display(),
        summary.real_len,
        summary.pad_len,
        summary.missing_positions.len()
    );
    Ok(())
}

fn write_features(prepared: &PreparedInput, dir: &Path) -> Result<PathBuf> {
    let angles = prepared.features.angles().mapv(f64::from);
    let table = AngleTable::from_array(&angles, prepared.pad_len());
    let path = dir.join(FEATURES_FILE);
    write_angle_table(&table, &path).map_err(EngineError::from)?;
    Ok(path)
}
