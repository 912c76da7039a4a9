use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DISTANCE_STEP: f64 = 0.01;
pub const DEFAULT_ATTEMPTS: usize = 5;
pub const DEFAULT_CLOSENESS_START: f64 = 1.0;
pub const DEFAULT_CLOSENESS_STEP: f64 = 0.01;
pub const DEFAULT_MAX_INNER_ITERATIONS: usize = 200;
pub const DEFAULT_RESTRAINT_FORCE: f64 = 50.0;
pub const DEFAULT_LIGAND_RESIDUE: &str = "LIG";
pub const DEFAULT_FORCEFIELD: &str = "leaprc.ff14SB";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Parameters of the solvation calibration search.
///
/// Distances and closeness values are never accumulated by repeated addition: they are
/// always derived from an integer step offset through [`CalibrationConfig::distance_at`]
/// and [`CalibrationConfig::closeness_at`], so two runs with the same configuration
/// query the oracle with bit-identical values.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    pub target_count: usize,
    pub initial_distance: f64,
    pub distance_step: f64,
    pub attempts: usize,
    pub closeness_start: f64,
    pub closeness_step: f64,
    pub max_inner_iterations: usize,
}

impl CalibrationConfig {
    pub fn distance_at(&self, offset: i64) -> f64 {
        self.initial_distance + offset as f64 * self.distance_step
    }

    pub fn closeness_at(&self, offset: i64) -> f64 {
        self.closeness_start + offset as f64 * self.closeness_step
    }
}

#[derive(Default)]
pub struct CalibrationConfigBuilder {
    target_count: Option<usize>,
    initial_distance: Option<f64>,
    distance_step: Option<f64>,
    attempts: Option<usize>,
    closeness_start: Option<f64>,
    closeness_step: Option<f64>,
    max_inner_iterations: Option<usize>,
}

impl CalibrationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_count(mut self, count: usize) -> Self {
        self.target_count = Some(count);
        self
    }
    pub fn initial_distance(mut self, distance: f64) -> Self {
        self.initial_distance = Some(distance);
        self
    }
    pub fn distance_step(mut self, step: f64) -> Self {
        self.distance_step = Some(step);
        self
    }
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = Some(attempts);
        self
    }
    pub fn closeness_start(mut self, closeness: f64) -> Self {
        self.closeness_start = Some(closeness);
        self
    }
    pub fn closeness_step(mut self, step: f64) -> Self {
        self.closeness_step = Some(step);
        self
    }
    pub fn max_inner_iterations(mut self, iterations: usize) -> Self {
        self.max_inner_iterations = Some(iterations);
        self
    }

    pub fn build(self) -> Result<CalibrationConfig, ConfigError> {
        let config = CalibrationConfig {
            target_count: self
                .target_count
                .ok_or(ConfigError::MissingParameter("target_count"))?,
            initial_distance: self
                .initial_distance
                .ok_or(ConfigError::MissingParameter("initial_distance"))?,
            distance_step: self.distance_step.unwrap_or(DEFAULT_DISTANCE_STEP),
            attempts: self.attempts.unwrap_or(DEFAULT_ATTEMPTS),
            closeness_start: self.closeness_start.unwrap_or(DEFAULT_CLOSENESS_START),
            closeness_step: self.closeness_step.unwrap_or(DEFAULT_CLOSENESS_STEP),
            max_inner_iterations: self
                .max_inner_iterations
                .unwrap_or(DEFAULT_MAX_INNER_ITERATIONS),
        };
        validate_positive("initial_distance", config.initial_distance)?;
        validate_positive("distance_step", config.distance_step)?;
        validate_positive("closeness_start", config.closeness_start)?;
        validate_positive("closeness_step", config.closeness_step)?;
        if config.max_inner_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_inner_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        let smallest = config.distance_at(-(config.attempts as i64));
        if smallest <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "attempts",
                reason: format!(
                    "{} steps of {} below {} reach a non-positive distance ({smallest})",
                    config.attempts, config.distance_step, config.initial_distance
                ),
            });
        }
        Ok(config)
    }
}

fn validate_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("expected a positive finite number, got {value}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeConfig {
    /// Keep hydrogens the reference library recognizes instead of stripping them all.
    pub keep_hydrogens: bool,
    /// Write the digit-rotated atom name back into kept records.
    pub rename_atoms: bool,
}

/// How an atom of the processed structure is matched against the atoms of the same
/// residue before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchStrategy {
    /// Same normalized atom name. Tolerates coordinates relaxed by the build tool.
    #[default]
    Identity,
    /// Same coordinate field text (columns 31-54).
    Coordinates,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Identity => write!(f, "identity"),
            MatchStrategy::Coordinates => write!(f, "coordinates"),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(MatchStrategy::Identity),
            "coordinates" => Ok(MatchStrategy::Coordinates),
            other => Err(ConfigError::InvalidParameter {
                name: "match_strategy",
                reason: format!("unknown strategy '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestraintConfig {
    /// Force constant written for restrained backbone atoms.
    pub force: f64,
    pub ligand_residue: String,
    /// When set, only atoms with these serial numbers can be restrained.
    pub serials: Option<HashSet<u32>>,
    /// Give atoms selected by the added-atom mask a zero force.
    pub release_added_atoms: bool,
    pub match_strategy: MatchStrategy,
}

impl Default for RestraintConfig {
    fn default() -> Self {
        Self {
            force: DEFAULT_RESTRAINT_FORCE,
            ligand_residue: DEFAULT_LIGAND_RESIDUE.to_string(),
            serials: None,
            release_added_atoms: false,
            match_strategy: MatchStrategy::default(),
        }
    }
}

/// Settings of the `&cntrl` namelist written for the external minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationConfig {
    pub title: String,
    pub max_cycles: u32,
    pub steepest_descent_cycles: u32,
    pub periodic_boundary: u32,
    pub minimization_method: u32,
    pub print_frequency: u32,
    pub cutoff: f64,
}

impl Default for MinimizationConfig {
    fn default() -> Self {
        Self {
            title: "In-Vacuo minimization with restraints".to_string(),
            max_cycles: 5000,
            steepest_descent_cycles: 1000,
            periodic_boundary: 0,
            minimization_method: 1,
            print_frequency: 5,
            cutoff: 10.0,
        }
    }
}

/// Ligand parameter files loaded into the build script ahead of the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigandParameters {
    pub mol2: PathBuf,
    pub frcmod: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub forcefield: String,
    pub ligand: Option<LigandParameters>,
    pub pb_radii: Option<String>,
    /// Molar salt concentration used to size the neutralizing ion shell.
    pub salt_concentration: Option<f64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            forcefield: DEFAULT_FORCEFIELD.to_string(),
            ligand: None,
            pb_radii: None,
            salt_concentration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareConfig {
    pub work_dir: PathBuf,
    pub calibration: CalibrationConfig,
    pub normalize: NormalizeConfig,
    pub build: BuildConfig,
    pub restraint: RestraintConfig,
    pub minimization: MinimizationConfig,
}

#[derive(Default)]
pub struct PrepareConfigBuilder {
    work_dir: Option<PathBuf>,
    calibration: Option<CalibrationConfig>,
    normalize: Option<NormalizeConfig>,
    build: Option<BuildConfig>,
    restraint: Option<RestraintConfig>,
    minimization: Option<MinimizationConfig>,
}

impl PrepareConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn calibration(mut self, config: CalibrationConfig) -> Self {
        self.calibration = Some(config);
        self
    }
    pub fn normalize(mut self, config: NormalizeConfig) -> Self {
        self.normalize = Some(config);
        self
    }
    pub fn build_settings(mut self, config: BuildConfig) -> Self {
        self.build = Some(config);
        self
    }
    pub fn restraint(mut self, config: RestraintConfig) -> Self {
        self.restraint = Some(config);
        self
    }
    pub fn minimization(mut self, config: MinimizationConfig) -> Self {
        self.minimization = Some(config);
        self
    }

    pub fn build(self) -> Result<PrepareConfig, ConfigError> {
        let build = self.build.unwrap_or_default();
        if let Some(concentration) = build.salt_concentration {
            if !(concentration.is_finite() && concentration >= 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "salt_concentration",
                    reason: format!("expected a non-negative number, got {concentration}"),
                });
            }
        }
        Ok(PrepareConfig {
            work_dir: self
                .work_dir
                .ok_or(ConfigError::MissingParameter("work_dir"))?,
            calibration: self
                .calibration
                .ok_or(ConfigError::MissingParameter("calibration"))?,
            normalize: self.normalize.unwrap_or_default(),
            build,
            restraint: self.restraint.unwrap_or_default(),
            minimization: self.minimization.unwrap_or_default(),
        })
    }
}
