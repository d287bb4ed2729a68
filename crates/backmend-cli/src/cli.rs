use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

/// Suffix of the missing-residue record that accompanies an input structure.
pub const MISSING_RECORD_SUFFIX: &str = ".missing";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "backmend - completes missing residues of protein backbones by sampling angles and refining the rebuilt coordinates.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the padded length, angle features and missing mask of a structure
    /// for an external sampler.
    Prepare(PrepareArgs),
    /// Rebuild, refine and select candidates from precomputed sampled angle tables.
    Correct(CorrectArgs),
    /// Refine and select an existing set of candidate structures.
    Refine(RefineArgs),
}

/// Options shared by every subcommand that writes an output directory.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Directory receiving all outputs.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Replace the output directory if it already exists.
    #[arg(long)]
    pub force: bool,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S refinement.num-epochs=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Input structure and the records describing it.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to the input PDB structure.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Missing-residue record (JSON). Defaults to `<input>.missing`.
    #[arg(short, long, value_name = "PATH")]
    pub missing: Option<PathBuf>,

    /// Per-channel angle statistics of the sampler's training set (JSON).
    #[arg(long, required = true, value_name = "PATH")]
    pub stats: PathBuf,

    /// Override the sampler window size.
    #[arg(long, value_name = "INT")]
    pub window_size: Option<usize>,

    /// Override the sampler window step.
    #[arg(long, value_name = "INT")]
    pub window_step: Option<usize>,
}

impl InputArgs {
    pub fn missing_record_path(&self) -> PathBuf {
        self.missing
            .clone()
            .unwrap_or_else(|| default_missing_record_path(&self.input))
    }
}

/// `protein.pdb` -> `protein.pdb.missing`.
pub fn default_missing_record_path(structure: &Path) -> PathBuf {
    let mut name = structure.as_os_str().to_os_string();
    name.push(MISSING_RECORD_SUFFIX);
    PathBuf::from(name)
}

/// Overrides of the refinement stage.
#[derive(Args, Debug, Clone, Default)]
pub struct RefinementArgs {
    /// Override the maximum number of refinement epochs.
    #[arg(long, value_name = "INT")]
    pub num_epochs: Option<usize>,

    /// Override the refinement learning rate.
    #[arg(long, value_name = "FLOAT")]
    pub learning_rate: Option<f64>,

    /// Override the number of candidates refined together.
    #[arg(long, value_name = "INT")]
    pub refine_batch_size: Option<usize>,
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `correct` subcommand.
#[derive(Args, Debug)]
pub struct CorrectArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Directory holding the sampled angle tables (`generated_{i}.csv[.gz]`).
    #[arg(long, required = true, value_name = "DIR")]
    pub samples: PathBuf,

    /// Override the number of candidates to use.
    #[arg(short, long, value_name = "INT")]
    pub num_candidates: Option<usize>,

    /// Override the sampling seed passed to the sampler.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub refinement: RefinementArgs,
}

/// Arguments for the `refine` subcommand.
#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Candidate PDB files to refine.
    #[arg(required = true, value_name = "PDB")]
    pub candidates: Vec<PathBuf>,

    /// Missing-residue record (JSON) shared by all candidates.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub missing: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub refinement: RefinementArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_arguments_parse_with_globals() {
        let cli = Cli::parse_from([
            "backmend", "-vv", "-j", "4", "correct", "-i", "in.pdb", "--stats", "stats.json",
            "--samples", "samples", "-o", "out", "--force", "-n", "5", "--num-epochs", "100",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        let Commands::Correct(args) = cli.command else {
            panic!("Expected 'correct' subcommand");
        };
        assert_eq!(args.input.input, PathBuf::from("in.pdb"));
        assert_eq!(args.input.missing_record_path(), PathBuf::from("in.pdb.missing"));
        assert!(args.output.force);
        assert_eq!(args.num_candidates, Some(5));
        assert_eq!(args.refinement.num_epochs, Some(100));
    }

    #[test]
    fn refine_takes_many_candidates() {
        let cli = Cli::parse_from([
            "backmend", "refine", "a.pdb", "b.pdb", "-m", "rec.json", "-o", "out",
        ]);
        let Commands::Refine(args) = cli.command else {
            panic!("Expected 'refine' subcommand");
        };
        assert_eq!(args.candidates.len(), 2);
        assert!(!args.output.force);
    }

    #[test]
    fn explicit_missing_record_wins() {
        let cli = Cli::parse_from([
            "backmend", "prepare", "-i", "in.pdb", "-m", "other.json", "--stats", "s.json", "-o",
            "out",
        ]);
        let Commands::Prepare(args) = cli.command else {
            panic!("Expected 'prepare' subcommand");
        };
        assert_eq!(args.input.missing_record_path(), PathBuf::from("other.json"));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from([
            "backmend", "-q", "-v", "refine", "a.pdb", "-m", "r.json", "-o", "out",
        ]);
        assert!(result.is_err());
    }
}
