use super::progress_handler;
use crate::cli::CorrectArgs;
use crate::config::PartialBackmendConfig;
use crate::error::{CliError, Result};
use crate::utils::output::{ensure_outside_output, prepare_output_dir};
use backmend::engine::error::EngineError;
use backmend::engine::progress::ProgressReporter;
use backmend::engine::sampler::PrecomputedSampler;
use backmend::workflows;
use tracing::{info, warn};

pub fn run(args: CorrectArgs, quiet: bool) -> Result<()> {
    let partial =
        PartialBackmendConfig::load(args.output.config.as_deref(), &args.output.set_values)?;
    let mut config = partial.correction_config(&args)?;
    let scorer = partial.scorer()?;
    ensure_outside_output(
        &config.output_dir,
        &[
            ("Structure", config.structure_path.as_path()),
            ("Missing-residue record", config.missing_record_path.as_path()),
            ("Angle statistics", config.stats_path.as_path()),
            ("Sample directory", args.samples.as_path()),
        ],
    )?;

    info!("Indexing sampled angle tables in {:?}", &args.samples);
    let sampler = PrecomputedSampler::from_dir(&args.samples).map_err(EngineError::from)?;
    if sampler.is_empty() {
        return Err(CliError::Argument(format!(
            "No generated_{{i}}.csv[.gz] tables found in {}",
            args.samples.display()
        )));
    }
    if args.num_candidates.is_none() && partial.num_candidates().is_none() {
        config.sampling.num_candidates = sampler.len();
    }
    if config.sampling.num_candidates > sampler.len() {
        warn!(
            requested = config.sampling.num_candidates,
            available = sampler.len(),
            "More candidates requested than tables available."
        );
    }

    prepare_output_dir(&config.output_dir, args.output.force)?;

    let progress = progress_handler(quiet);
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    println!(
        "Correcting {} with {} candidate(s)...",
        config.structure_path.display(),
        config.sampling.num_candidates
    );
    let result = workflows::correct::run(&config, &sampler, &scorer, &reporter)?;

    if !result.rejected.is_empty() {
        warn!("{} sampled table(s) could not be rebuilt.", result.rejected.len());
        println!(
            "Warning: {} sampled table(s) could not be rebuilt and were skipped.",
            result.rejected.len()
        );
    }
    if !result.failed.is_empty() {
        warn!("{} candidate(s) diverged during refinement.", result.failed.len());
        println!(
            "Warning: {} candidate(s) diverged during refinement and were skipped.",
            result.failed.len()
        );
    }
    println!(
        "✓ Best sampled candidate: {} (score {:.4})",
        result.sampled_pdbs[result.original_best.index].display(),
        result.original_best.score
    );
    match &result.fine_tuned_best {
        Some(best) => println!(
            "✓ Best refined candidate: {} (score {:.4})",
            result.refined_pdbs[best.index].display(),
            best.score
        ),
        None => println!("Warning: no refined candidate was produced."),
    }
    println!("Results written to {}", config.output_dir.display());
    Ok(())
}
