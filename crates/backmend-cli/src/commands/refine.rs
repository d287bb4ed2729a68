use super::progress_handler;
use crate::cli::RefineArgs;
use crate::config::PartialBackmendConfig;
use crate::error::Result;
use crate::utils::output::{ensure_outside_output, prepare_output_dir};
use backmend::engine::progress::ProgressReporter;
use backmend::workflows;
use tracing::warn;

pub fn run(args: RefineArgs, quiet: bool) -> Result<()> {
    let partial =
        PartialBackmendConfig::load(args.output.config.as_deref(), &args.output.set_values)?;
    let config = partial.refine_config(&args)?;
    let scorer = partial.scorer()?;

    let mut inputs = vec![("Missing-residue record", config.missing_record_path.as_path())];
    inputs.extend(config.candidate_paths.iter().map(|p| ("Candidate", p.as_path())));
    ensure_outside_output(&config.output_dir, &inputs)?;
    prepare_output_dir(&config.output_dir, args.output.force)?;

    let progress = progress_handler(quiet);
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    println!("Refining {} candidate(s)...", config.candidate_paths.len());
    let result = workflows::refine::run(&config, &scorer, &reporter)?;

    if !result.failed.is_empty() {
        warn!("{} candidate(s) diverged during refinement.", result.failed.len());
        println!(
            "Warning: {} candidate(s) diverged during refinement and were skipped.",
            result.failed.len()
        );
    }
    println!(
        "✓ Best input candidate: {} (score {:.4})",
        config.candidate_paths[result.original_best.index].display(),
        result.original_best.score
    );
    if let Some(best) = &result.fine_tuned_best {
        println!(
            "✓ Best refined candidate: {} (score {:.4})",
            result.refined_pdbs[best.index].display(),
            best.score
        );
    }
    println!("Results written to {}", config.output_dir.display());
    Ok(())
}
