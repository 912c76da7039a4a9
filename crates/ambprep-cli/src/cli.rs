use ambprep::engine::config::MatchStrategy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "ambprep - Normalize structures, calibrate solvation boxes and derive restraint masks for AMBER-style preparation.",
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

    /// Set the number of threads used when normalizing several structures.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter atom records against a reference residue library.
    Normalize(NormalizeArgs),
    /// Search the solvation box parameters that place a target number of solvent molecules.
    Calibrate(CalibrateArgs),
    /// Derive the mask of atoms added by the build tool and the region masks.
    Mask(MaskArgs),
    /// Run the complete preparation pipeline in a working directory.
    Prepare(PrepareArgs),
}

/// Arguments for the `normalize` subcommand.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input structure files (PDB).
    #[arg(required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Reference residue library.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Directory receiving the normalized structures, one per input, same file names.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Keep hydrogens recognized by the library instead of stripping them.
    #[arg(long)]
    pub keep_hydrogens: bool,

    /// Write normalized atom names back into the records.
    #[arg(long)]
    pub rename_atoms: bool,
}

/// Solvation search overrides shared by `calibrate` and `prepare`.
#[derive(Args, Debug, Clone, Default)]
pub struct CalibrationOverrides {
    /// Number of solvent molecules to place.
    #[arg(short, long = "target", value_name = "INT")]
    pub target_count: Option<usize>,

    /// Initial buffer distance in Angstroms.
    #[arg(short = 'd', long = "distance", value_name = "FLOAT")]
    pub initial_distance: Option<f64>,

    /// Number of buffer distances tried around the initial one.
    #[arg(long, value_name = "INT")]
    pub attempts: Option<usize>,

    /// Maximum oracle calls per buffer distance.
    #[arg(long, value_name = "INT")]
    pub max_inner_iterations: Option<usize>,
}

/// Build tool overrides shared by `calibrate` and `prepare`.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildOverrides {
    /// The build tool executable.
    #[arg(long, value_name = "PATH")]
    pub leap: Option<PathBuf>,

    /// Force field file sourced at the top of every build script.
    #[arg(long, value_name = "NAME")]
    pub forcefield: Option<String>,

    /// Salt concentration in mol/L; enables the ion shell.
    #[arg(long, value_name = "FLOAT")]
    pub salt: Option<f64>,
}

/// Arguments for the `calibrate` subcommand.
#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Normalized structure to solvate.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Working directory for build scripts and logs.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the calibration report (TOML) to this path.
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub calibration: CalibrationOverrides,

    #[command(flatten)]
    pub build: BuildOverrides,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S calibration.attempts=7
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `mask` subcommand.
#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Structure before the build (the normalized input).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub before: PathBuf,

    /// Structure written by the build tool.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub after: PathBuf,

    /// How atoms are paired between the two structures.
    #[arg(short, long, default_value_t = MatchStrategy::Identity, value_name = "STRATEGY")]
    pub strategy: MatchStrategy,

    /// Reference residue library; enables the region masks.
    #[arg(short, long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Residue name of the ligand.
    #[arg(long, default_value = "LIG", value_name = "NAME")]
    pub ligand_residue: String,

    /// Write a minimization input restricted to the added atoms.
    #[arg(short = 'm', long, value_name = "PATH")]
    pub min_input: Option<PathBuf>,
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Input structure file (PDB).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Reference residue library.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Working directory receiving every generated file.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub calibration: CalibrationOverrides,

    #[command(flatten)]
    pub build: BuildOverrides,

    /// Override `restraint.match-strategy` from the config file.
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<MatchStrategy>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S restraint.force=25.0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
