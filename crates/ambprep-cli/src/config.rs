use crate::cli::{BuildOverrides, CalibrateArgs, CalibrationOverrides, PrepareArgs};
use crate::error::{CliError, Result};
use ambprep::engine::config as core_config;
use ambprep::engine::oracle::DEFAULT_LEAP_EXECUTABLE;
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialCalibrationConfig {
    target_count: Option<usize>,
    initial_distance: Option<f64>,
    distance_step: Option<f64>,
    attempts: Option<usize>,
    closeness_start: Option<f64>,
    closeness_step: Option<f64>,
    max_inner_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialNormalizeConfig {
    keep_hydrogens: Option<bool>,
    rename_atoms: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialLigandConfig {
    mol2: PathBuf,
    frcmod: PathBuf,
}

impl From<PartialLigandConfig> for core_config::LigandParameters {
    fn from(p: PartialLigandConfig) -> Self {
        Self {
            mol2: p.mol2,
            frcmod: p.frcmod,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialBuildConfig {
    forcefield: Option<String>,
    pb_radii: Option<String>,
    salt_concentration: Option<f64>,
    leap_executable: Option<PathBuf>,
    ligand: Option<PartialLigandConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRestraintConfig {
    force: Option<f64>,
    ligand_residue: Option<String>,
    match_strategy: Option<String>,
    release_added_atoms: Option<bool>,
    serials: Option<Vec<u32>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMinimizationConfig {
    title: Option<String>,
    max_cycles: Option<u32>,
    steepest_descent_cycles: Option<u32>,
    print_frequency: Option<u32>,
    cutoff: Option<f64>,
}

/// Everything the configuration file may set. Every section and key is optional;
/// command-line arguments take precedence over file values.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAppConfig {
    calibration: Option<PartialCalibrationConfig>,
    normalize: Option<PartialNormalizeConfig>,
    build: Option<PartialBuildConfig>,
    restraint: Option<PartialRestraintConfig>,
    minimization: Option<PartialMinimizationConfig>,
}

/// Resolved settings of the `calibrate` command.
#[derive(Debug)]
pub struct CalibrateSettings {
    pub calibration: core_config::CalibrationConfig,
    pub build: core_config::BuildConfig,
    pub leap_executable: PathBuf,
}

/// Resolved settings of the `prepare` command.
#[derive(Debug)]
pub struct PrepareSettings {
    pub prepare: core_config::PrepareConfig,
    pub leap_executable: PathBuf,
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e)))
}

impl PartialAppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` when given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn into_calibrate_settings(mut self, args: &CalibrateArgs) -> Result<CalibrateSettings> {
        self.apply_set_values(&args.set_values)?;
        let calibration = self.merge_calibration(&args.calibration)?;
        let (build, leap_executable) = self.merge_build(&args.build);
        Ok(CalibrateSettings {
            calibration,
            build,
            leap_executable,
        })
    }

    pub fn into_prepare_settings(mut self, args: &PrepareArgs) -> Result<PrepareSettings> {
        self.apply_set_values(&args.set_values)?;
        let calibration = self.merge_calibration(&args.calibration)?;
        let (build, leap_executable) = self.merge_build(&args.build);

        let normalize = self.normalize.take().unwrap_or_default();
        let normalize = core_config::NormalizeConfig {
            keep_hydrogens: normalize.keep_hydrogens.unwrap_or(false),
            rename_atoms: normalize.rename_atoms.unwrap_or(false),
        };

        let mut restraint = self.merge_restraint()?;
        if let Some(strategy) = args.strategy {
            restraint.match_strategy = strategy;
        }

        let prepare = core_config::PrepareConfigBuilder::new()
            .work_dir(args.work_dir.clone())
            .calibration(calibration)
            .normalize(normalize)
            .build_settings(build)
            .restraint(restraint)
            .minimization(self.merge_minimization())
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(PrepareSettings {
            prepare,
            leap_executable,
        })
    }

    fn merge_calibration(
        &mut self,
        overrides: &CalibrationOverrides,
    ) -> Result<core_config::CalibrationConfig> {
        let file = self.calibration.take().unwrap_or_default();
        let mut builder = core_config::CalibrationConfigBuilder::new();

        if let Some(count) = overrides.target_count.or(file.target_count) {
            builder = builder.target_count(count);
        }
        if let Some(distance) = overrides.initial_distance.or(file.initial_distance) {
            builder = builder.initial_distance(distance);
        }
        if let Some(attempts) = overrides.attempts.or(file.attempts) {
            builder = builder.attempts(attempts);
        }
        if let Some(cap) = overrides
            .max_inner_iterations
            .or(file.max_inner_iterations)
        {
            builder = builder.max_inner_iterations(cap);
        }
        if let Some(step) = file.distance_step {
            builder = builder.distance_step(step);
        }
        if let Some(start) = file.closeness_start {
            builder = builder.closeness_start(start);
        }
        if let Some(step) = file.closeness_step {
            builder = builder.closeness_step(step);
        }

        builder.build().map_err(|e| {
            CliError::Config(format!(
                "{}. Provide it in the [calibration] section or via command-line arguments.",
                e
            ))
        })
    }

    fn merge_build(
        &mut self,
        overrides: &BuildOverrides,
    ) -> (core_config::BuildConfig, PathBuf) {
        let file = self.build.take().unwrap_or_default();
        let defaults = core_config::BuildConfig::default();

        let build = core_config::BuildConfig {
            forcefield: overrides
                .forcefield
                .clone()
                .or(file.forcefield)
                .unwrap_or(defaults.forcefield),
            ligand: file.ligand.map(Into::into),
            pb_radii: file.pb_radii,
            salt_concentration: overrides.salt.or(file.salt_concentration),
        };
        let leap_executable = overrides
            .leap
            .clone()
            .or(file.leap_executable)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEAP_EXECUTABLE));
        (build, leap_executable)
    }

    fn merge_restraint(&mut self) -> Result<core_config::RestraintConfig> {
        let file = self.restraint.take().unwrap_or_default();
        let defaults = core_config::RestraintConfig::default();
        let match_strategy = match file.match_strategy {
            Some(raw) => raw
                .parse()
                .map_err(|e: core_config::ConfigError| CliError::Config(e.to_string()))?,
            None => defaults.match_strategy,
        };
        Ok(core_config::RestraintConfig {
            force: file.force.unwrap_or(defaults.force),
            ligand_residue: file.ligand_residue.unwrap_or(defaults.ligand_residue),
            serials: file.serials.map(|serials| serials.into_iter().collect()),
            release_added_atoms: file
                .release_added_atoms
                .unwrap_or(defaults.release_added_atoms),
            match_strategy,
        })
    }

    fn merge_minimization(&mut self) -> core_config::MinimizationConfig {
        let file = self.minimization.take().unwrap_or_default();
        let defaults = core_config::MinimizationConfig::default();
        core_config::MinimizationConfig {
            title: file.title.unwrap_or(defaults.title),
            max_cycles: file.max_cycles.unwrap_or(defaults.max_cycles),
            steepest_descent_cycles: file
                .steepest_descent_cycles
                .unwrap_or(defaults.steepest_descent_cycles),
            print_frequency: file.print_frequency.unwrap_or(defaults.print_frequency),
            cutoff: file.cutoff.unwrap_or(defaults.cutoff),
            ..defaults
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "calibration.target-count" => {
                    self.calibration
                        .get_or_insert_with(Default::default)
                        .target_count = Some(parse_value(key, value)?);
                }
                "calibration.initial-distance" => {
                    self.calibration
                        .get_or_insert_with(Default::default)
                        .initial_distance = Some(parse_value(key, value)?);
                }
                "calibration.attempts" => {
                    self.calibration
                        .get_or_insert_with(Default::default)
                        .attempts = Some(parse_value(key, value)?);
                }
                "calibration.max-inner-iterations" => {
                    self.calibration
                        .get_or_insert_with(Default::default)
                        .max_inner_iterations = Some(parse_value(key, value)?);
                }
                "build.forcefield" => {
                    self.build.get_or_insert_with(Default::default).forcefield =
                        Some(value.to_string());
                }
                "build.salt-concentration" => {
                    self.build
                        .get_or_insert_with(Default::default)
                        .salt_concentration = Some(parse_value(key, value)?);
                }
                "restraint.force" => {
                    self.restraint.get_or_insert_with(Default::default).force =
                        Some(parse_value(key, value)?);
                }
                "restraint.ligand-residue" => {
                    self.restraint
                        .get_or_insert_with(Default::default)
                        .ligand_residue = Some(value.to_string());
                }
                "restraint.match-strategy" => {
                    self.restraint
                        .get_or_insert_with(Default::default)
                        .match_strategy = Some(value.to_string());
                }
                "minimization.max-cycles" => {
                    self.minimization
                        .get_or_insert_with(Default::default)
                        .max_cycles = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use ambprep::engine::config::MatchStrategy;
    use clap::Parser;
    use std::fs;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("ambprep.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn prepare_args(extra: &[&str]) -> PrepareArgs {
        let mut argv = vec![
            "ambprep", "prepare", "-i", "in.pdb", "-l", "lib.dat", "-w", "work",
        ];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Prepare(args) => args,
            _ => panic!("Expected 'prepare' subcommand"),
        }
    }

    fn calibrate_args(extra: &[&str]) -> CalibrateArgs {
        let mut argv = vec!["ambprep", "calibrate", "-i", "rec.pdb", "-w", "work"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Calibrate(args) => args,
            _ => panic!("Expected 'calibrate' subcommand"),
        }
    }

    const FULL_CONFIG: &str = r#"
        [calibration]
        target-count = 1500
        initial-distance = 10.0
        attempts = 7

        [normalize]
        keep-hydrogens = true

        [build]
        forcefield = "leaprc.protein.ff19SB"
        pb-radii = "mbondi2"
        salt-concentration = 0.15
        leap-executable = "/opt/amber/bin/tleap"

        [build.ligand]
        mol2 = "lig.mol2"
        frcmod = "lig.frcmod"

        [restraint]
        force = 25.0
        match-strategy = "coordinates"
        serials = [1, 2, 3]

        [minimization]
        max-cycles = 2000
    "#;

    #[test]
    fn file_values_are_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), FULL_CONFIG);

        let settings = PartialAppConfig::from_file(&path)
            .unwrap()
            .into_prepare_settings(&prepare_args(&[]))
            .unwrap();
        let config = settings.prepare;

        assert_eq!(config.calibration.target_count, 1500);
        assert_eq!(config.calibration.attempts, 7);
        assert_eq!(config.calibration.max_inner_iterations, 200);
        assert!(config.normalize.keep_hydrogens);
        assert!(!config.normalize.rename_atoms);
        assert_eq!(config.build.forcefield, "leaprc.protein.ff19SB");
        assert_eq!(config.build.pb_radii.as_deref(), Some("mbondi2"));
        assert_eq!(config.build.salt_concentration, Some(0.15));
        assert_eq!(
            config.build.ligand.unwrap().frcmod,
            PathBuf::from("lig.frcmod")
        );
        assert_eq!(config.restraint.force, 25.0);
        assert_eq!(config.restraint.match_strategy, MatchStrategy::Coordinates);
        assert_eq!(config.restraint.serials.unwrap().len(), 3);
        assert_eq!(config.restraint.ligand_residue, "LIG");
        assert_eq!(config.minimization.max_cycles, 2000);
        assert_eq!(config.minimization.steepest_descent_cycles, 1000);
        assert_eq!(config.work_dir, PathBuf::from("work"));
        assert_eq!(
            settings.leap_executable,
            PathBuf::from("/opt/amber/bin/tleap")
        );
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), FULL_CONFIG);
        let args = prepare_args(&[
            "-t",
            "900",
            "--salt",
            "0.0",
            "--leap",
            "tleap",
            "--strategy",
            "identity",
        ]);

        let settings = PartialAppConfig::from_file(&path)
            .unwrap()
            .into_prepare_settings(&args)
            .unwrap();

        assert_eq!(settings.prepare.calibration.target_count, 900);
        assert_eq!(settings.prepare.build.salt_concentration, Some(0.0));
        assert_eq!(
            settings.prepare.restraint.match_strategy,
            MatchStrategy::Identity
        );
        assert_eq!(settings.leap_executable, PathBuf::from("tleap"));
    }

    #[test]
    fn set_values_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), FULL_CONFIG);
        let args = calibrate_args(&["-S", "calibration.attempts=3", "-S", "build.forcefield=ff"]);

        let settings = PartialAppConfig::from_file(&path)
            .unwrap()
            .into_calibrate_settings(&args)
            .unwrap();

        assert_eq!(settings.calibration.attempts, 3);
        assert_eq!(settings.build.forcefield, "ff");
    }

    #[test]
    fn arguments_alone_are_enough_without_a_file() {
        let args = calibrate_args(&["-t", "1500", "-d", "12.0"]);
        let settings = PartialAppConfig::load(None)
            .unwrap()
            .into_calibrate_settings(&args)
            .unwrap();

        assert_eq!(settings.calibration.initial_distance, 12.0);
        assert_eq!(settings.build, core_config::BuildConfig::default());
        assert_eq!(settings.leap_executable, PathBuf::from("tleap"));
    }

    #[test]
    fn missing_target_count_is_reported() {
        let err = PartialAppConfig::default()
            .into_calibrate_settings(&calibrate_args(&["-d", "10.0"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("target_count")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[calibration]\ntarget = 1500\n");
        let err = PartialAppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let mut config = PartialAppConfig::default();
        assert!(matches!(
            config.apply_set_values(&["calibration.attempts".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["calibration.attempts=many".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["optimization.num-solutions=2".to_string()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_match_strategy_in_file_is_reported() {
        let args = prepare_args(&["-t", "10", "-d", "10.0", "-S", "restraint.match-strategy=bytes"]);
        let err = PartialAppConfig::default()
            .into_prepare_settings(&args)
            .unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("bytes")));
    }
}
