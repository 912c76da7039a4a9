use super::calibrate::CalibrationReport;
use super::read_structure;
use crate::cli::PrepareArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use ambprep::core::library::registry::ReferenceLibrary;
use ambprep::engine::oracle::TleapRunner;
use ambprep::engine::progress::ProgressReporter;
use ambprep::workflows;
use tracing::{info, warn};

const REPORT_FILE: &str = "calibration.toml";

pub fn run(args: PrepareArgs) -> Result<()> {
    let settings = PartialAppConfig::load(args.config.as_deref())?.into_prepare_settings(&args)?;
    let config = &settings.prepare;

    info!("Loading reference library from {:?}", &args.library);
    let library = ReferenceLibrary::load(&args.library)?;
    info!("Loading input structure from {:?}", &args.input);
    let input = read_structure(&args.input)?;

    let mut runner =
        TleapRunner::new(&config.work_dir).with_executable(&settings.leap_executable);
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Preparing {} in {}", args.input.display(), config.work_dir.display());
    let result = workflows::prepare::run(&input, &library, config, &mut runner, &reporter)?;

    for warning in &result.normalization.warnings {
        println!("  Warning: {}", warning);
    }
    println!(
        "✓ Normalized receptor ({} atom(s) removed) written to: {}",
        result.normalization.removed_count(),
        result.files.receptor.display()
    );

    let report = CalibrationReport::new(
        &result.calibration,
        result.normalization.structure.residue_count(),
    );
    report.print_summary();
    report.write_to(&config.work_dir.join(REPORT_FILE))?;

    if !result.ions.is_empty() {
        println!(
            "  Ions added: {} Na+, {} Cl-",
            result.ions.sodium, result.ions.chloride
        );
    }
    println!(
        "✓ Solvated structure written to: {}",
        result.files.solvated.display()
    );
    println!(
        "✓ Restraint reference written to: {}",
        result.files.restraint_reference.display()
    );

    match (&result.added_atoms, &result.files.minimization_input) {
        (Ok(mask), Some(path)) => {
            println!("  Added atoms ({}): {}", mask.len(), mask);
            println!("✓ Minimization input written to: {}", path.display());
        }
        (Err(e), _) => {
            warn!("Added atoms could not be identified: {}", e);
            println!("⚠ Added atoms could not be identified ({}); no minimization input written.", e);
        }
        (Ok(_), None) => {}
    }

    let regions = &result.regions;
    for (label, mask) in [
        ("Protein", &regions.protein),
        ("Ligand", &regions.ligand),
        ("Water", &regions.water),
    ] {
        if let Some(mask) = mask {
            println!("  {} region: {}", label, mask);
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::{BuildOverrides, CalibrationOverrides};
    use crate::commands::fixtures::{DIPEPTIDE, LIBRARY, write};
    use crate::error::CliError;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// A build tool stand-in that saves the loaded receptor unchanged.
    fn fake_leap(dir: &Path, script: &str) -> PathBuf {
        let path = write(dir, "fake-tleap", script);
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn args(dir: &Path, leap: PathBuf) -> PrepareArgs {
        PrepareArgs {
            input: write(dir, "input.pdb", DIPEPTIDE),
            library: write(dir, "lib.dat", LIBRARY),
            work_dir: dir.join("work"),
            config: None,
            calibration: CalibrationOverrides {
                target_count: Some(1500),
                initial_distance: Some(10.0),
                attempts: Some(1),
                max_inner_iterations: Some(3),
            },
            build: BuildOverrides {
                leap: Some(leap),
                ..BuildOverrides::default()
            },
            strategy: None,
            set_values: Vec::new(),
        }
    }

    #[test]
    #[serial]
    fn pipeline_writes_outputs_into_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let leap = fake_leap(
            dir.path(),
            "#!/bin/sh\ncp rec.pdb start.pdb\necho \"Added 1500 residues.\"\n",
        );

        run(args(dir.path(), leap)).unwrap();

        let work = dir.path().join("work");
        for name in ["rec.pdb", "start.pdb", "restraint.pdb", "min.in", REPORT_FILE] {
            assert!(work.join(name).exists(), "{name} was not written");
        }
        let report = std::fs::read_to_string(work.join(REPORT_FILE)).unwrap();
        assert!(report.contains("exact = true"));
    }

    #[test]
    #[serial]
    fn failing_build_tool_aborts_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let leap = fake_leap(dir.path(), "#!/bin/sh\nexit 3\n");

        let err = run(args(dir.path(), leap)).unwrap_err();
        assert!(matches!(err, CliError::Engine(_)));
        assert!(dir.path().join("work/rec.pdb").exists());
    }
}
