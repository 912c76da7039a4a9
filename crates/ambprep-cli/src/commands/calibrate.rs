use super::{read_structure, write_structure};
use crate::cli::CalibrateArgs;
use crate::config::PartialAppConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use ambprep::engine::leap::LeapScript;
use ambprep::engine::oracle::{LeapOracle, TleapRunner};
use ambprep::engine::progress::ProgressReporter;
use ambprep::engine::state::{CalibrationOutcome, CalibrationResult};
use ambprep::engine::tasks::{calibration, normalize};
use ambprep::workflows::prepare::RECEPTOR_FILE;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct AttemptRow {
    distance: f64,
    closeness: f64,
    count: usize,
    difference: i64,
}

impl From<&CalibrationResult> for AttemptRow {
    fn from(result: &CalibrationResult) -> Self {
        Self {
            distance: result.point.distance,
            closeness: result.point.closeness,
            count: result.observed_count,
            difference: result.signed_diff,
        }
    }
}

/// Serializable summary of a calibration run; every value is a scalar or a list so the
/// TOML output stays flat.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CalibrationReport {
    target_count: usize,
    exact: bool,
    distance: f64,
    closeness: f64,
    observed_count: usize,
    residues_to_remove: Vec<usize>,
    attempts: Vec<AttemptRow>,
}

impl CalibrationReport {
    pub(crate) fn new(outcome: &CalibrationOutcome, solute_residues: usize) -> Self {
        Self {
            target_count: outcome.target_count,
            exact: outcome.is_exact(),
            distance: outcome.best.point.distance,
            closeness: outcome.best.point.closeness,
            observed_count: outcome.best.observed_count,
            residues_to_remove: outcome.residues_to_remove(solute_residues),
            attempts: outcome.attempts.iter().map(AttemptRow::from).collect(),
        }
    }

    pub(crate) fn write_to(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to encode report: {}", e)))?;
        std::fs::write(path, text)?;
        info!("Calibration report written to {:?}", path);
        Ok(())
    }

    pub(crate) fn print_summary(&self) {
        if self.exact {
            println!(
                "✓ Exact match: distance {:.2}, closeness {:.2} places {} molecules.",
                self.distance, self.closeness, self.observed_count
            );
        } else {
            println!(
                "Closest match: distance {:.2}, closeness {:.2} places {} molecules (target {}).",
                self.distance, self.closeness, self.observed_count, self.target_count
            );
            if !self.residues_to_remove.is_empty() {
                println!(
                    "  Surplus residues to remove: {}",
                    self.residues_to_remove
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        println!("  Builds run: {}", self.attempts.len());
    }
}

pub fn run(args: CalibrateArgs) -> Result<()> {
    let settings =
        PartialAppConfig::load(args.config.as_deref())?.into_calibrate_settings(&args)?;

    std::fs::create_dir_all(&args.work_dir)?;
    // Same receptor filtering as `prepare`, so both commands count the same solute.
    let receptor = normalize::prepare_receptor(&read_structure(&args.input)?);
    write_structure(&receptor, &args.work_dir.join(RECEPTOR_FILE))?;
    let solute_residues = receptor.residue_count();

    let template = LeapScript::from_build_config(RECEPTOR_FILE, &settings.build);
    let mut runner =
        TleapRunner::new(&args.work_dir).with_executable(&settings.leap_executable);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!(
        target = settings.calibration.target_count,
        residues = solute_residues,
        "Starting solvation calibration."
    );
    let outcome = {
        let mut oracle = LeapOracle::new(&mut runner, &template);
        calibration::run(&mut oracle, &settings.calibration, &reporter)?
    };

    let report = CalibrationReport::new(&outcome, solute_residues);
    report.print_summary();
    if let Some(path) = &args.report {
        report.write_to(path)?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::{BuildOverrides, CalibrationOverrides};
    use crate::commands::fixtures::{DIPEPTIDE, write};
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn fake_leap(dir: &Path, count: usize) -> PathBuf {
        let path = write(
            dir,
            "fake-tleap",
            &format!("#!/bin/sh\necho \"Added {} residues.\"\n", count),
        );
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn args(dir: &Path, leap: PathBuf, target: usize) -> CalibrateArgs {
        CalibrateArgs {
            input: write(dir, "rec.pdb", DIPEPTIDE),
            work_dir: dir.join("work"),
            config: None,
            report: Some(dir.join("report.toml")),
            calibration: CalibrationOverrides {
                target_count: Some(target),
                initial_distance: Some(10.0),
                attempts: Some(3),
                max_inner_iterations: Some(5),
            },
            build: BuildOverrides {
                leap: Some(leap),
                ..BuildOverrides::default()
            },
            set_values: Vec::new(),
        }
    }

    #[test]
    #[serial]
    fn exact_count_is_reported_after_one_build() {
        let dir = tempfile::tempdir().unwrap();
        let leap = fake_leap(dir.path(), 1500);

        run(args(dir.path(), leap, 1500)).unwrap();

        let report: toml::Value =
            toml::from_str(&std::fs::read_to_string(dir.path().join("report.toml")).unwrap())
                .unwrap();
        assert_eq!(report["exact"].as_bool(), Some(true));
        assert_eq!(report["observed-count"].as_integer(), Some(1500));
        assert_eq!(report["attempts"].as_array().unwrap().len(), 1);
        let script = std::fs::read_to_string(dir.path().join("work/leap.in")).unwrap();
        assert!(script.contains("solvateBox complex TIP3PBOX 10.00 1.00"));
    }

    #[test]
    #[serial]
    fn builds_load_the_filtered_receptor_and_drop_list_follows_it() {
        let dir = tempfile::tempdir().unwrap();
        let leap = write(
            dir.path(),
            "fake-tleap",
            "#!/bin/sh\n\
             if grep -q 'TIP3PBOX 10.00 1.00' leap.in; then\n\
             echo 'Added 1498 residues.'\n\
             else\n\
             echo 'Added 1501 residues.'\n\
             fi\n",
        );
        let mut permissions = std::fs::metadata(&leap).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&leap, permissions).unwrap();

        run(args(dir.path(), leap, 1500)).unwrap();

        let receptor = std::fs::read_to_string(dir.path().join("work").join(RECEPTOR_FILE)).unwrap();
        assert!(!receptor.contains("REMARK"));
        assert!(!receptor.contains("END"));
        assert!(receptor.trim_end().ends_with("TER"));
        let script = std::fs::read_to_string(dir.path().join("work/leap.in")).unwrap();
        assert!(script.contains("complex = loadPdb rec.pdb"));

        let report: toml::Value =
            toml::from_str(&std::fs::read_to_string(dir.path().join("report.toml")).unwrap())
                .unwrap();
        assert_eq!(report["exact"].as_bool(), Some(false));
        assert_eq!(report["distance"].as_float(), Some(10.0));
        let to_remove: Vec<i64> = report["residues-to-remove"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_integer().unwrap())
            .collect();
        assert_eq!(to_remove, vec![1503]);
    }

    #[test]
    #[serial]
    fn unreachable_target_reports_unconverged_search() {
        let dir = tempfile::tempdir().unwrap();
        let leap = fake_leap(dir.path(), 1502);

        let err = run(args(dir.path(), leap, 1500)).unwrap_err();
        assert!(matches!(err, CliError::Engine(_)));
    }
}
