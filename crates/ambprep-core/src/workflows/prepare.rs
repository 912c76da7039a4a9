use crate::core::io::pdb::{PdbError, PdbFile};
use crate::core::io::traits::StructureFile;
use crate::core::library::registry::ReferenceLibrary;
use crate::core::models::structure::Structure;
use crate::engine::config::PrepareConfig;
use crate::engine::error::EngineError;
use crate::engine::leap::{IonCounts, LeapLog, LeapScript};
use crate::engine::minimization::MinimizationInput;
use crate::engine::oracle::{LeapBackend, LeapOracle};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::CalibrationOutcome;
use crate::engine::tasks::calibration;
use crate::engine::tasks::normalize::{self, NormalizationReport};
use crate::engine::tasks::restraint::{self, RegionMasks, RestraintMask};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Name of the normalized receptor written into the working directory.
pub const RECEPTOR_FILE: &str = "rec.pdb";
/// Name of the force-weighted reference structure.
pub const RESTRAINT_REFERENCE_FILE: &str = "restraint.pdb";
/// Name of the restrained minimization input.
pub const MINIMIZATION_INPUT_FILE: &str = "min.in";

/// Paths of the files produced by a preparation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFiles {
    pub receptor: PathBuf,
    pub solvated: PathBuf,
    pub restraint_reference: PathBuf,
    /// Absent when the atoms added by the build could not be identified.
    pub minimization_input: Option<PathBuf>,
}

#[derive(Debug)]
pub struct PreparationResult {
    pub normalization: NormalizationReport,
    pub calibration: CalibrationOutcome,
    pub removed_residues: Vec<usize>,
    pub ions: IonCounts,
    pub build_log: LeapLog,
    /// Atoms added by the build tool. A failure here only skips the minimization input.
    pub added_atoms: Result<RestraintMask, EngineError>,
    pub regions: RegionMasks,
    pub files: PreparedFiles,
}

/// Runs the complete preparation pipeline in `config.work_dir`.
///
/// The phases are: normalization of the input against the reference library,
/// calibration of the solvation box against the requested solvent count, the final
/// build with ions and surplus solvent removed, and the restraint outputs for the
/// subsequent minimization.
///
/// # Arguments
///
/// * `input` - The structure to prepare, as read from disk.
/// * `library` - Reference residue definitions.
/// * `config` - Pipeline settings.
/// * `backend` - Executes build scripts; it must read from and write to `config.work_dir`.
/// * `reporter` - Receives phase and oracle progress events.
///
/// # Errors
///
/// Returns an [`EngineError`] if any build fails, calibration does not converge, or an
/// output file cannot be written. Failing to identify the atoms added by the build is
/// not an error; see [`PreparationResult::added_atoms`].
#[instrument(skip_all, name = "prepare_workflow")]
pub fn run<B: LeapBackend + ?Sized>(
    input: &Structure,
    library: &ReferenceLibrary,
    config: &PrepareConfig,
    backend: &mut B,
    reporter: &ProgressReporter,
) -> Result<PreparationResult, EngineError> {
    let work_dir = config.work_dir.as_path();
    std::fs::create_dir_all(work_dir).map_err(|source| EngineError::Io {
        path: work_dir.to_string_lossy().to_string(),
        source,
    })?;

    // === Phase 1: Normalization ===
    reporter.report(Progress::PhaseStart {
        name: "Normalization",
    });
    let receptor = normalize::prepare_receptor(input);
    let normalization = normalize::run(&receptor, library, &config.normalize);
    let receptor_path = work_dir.join(RECEPTOR_FILE);
    write_structure(&normalization.structure, &receptor_path)?;
    let solute_residues = normalization.structure.residue_count();
    info!(
        residues = solute_residues,
        removed = normalization.removed_count(),
        "Receptor normalized."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Solvation calibration ===
    reporter.report(Progress::PhaseStart {
        name: "Solvation Calibration",
    });
    let template = LeapScript::from_build_config(RECEPTOR_FILE, &config.build);
    let outcome = {
        let mut oracle = LeapOracle::new(&mut *backend, &template);
        calibration::run(&mut oracle, &config.calibration, reporter)?
    };
    let removed_residues = outcome.residues_to_remove(solute_residues);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Final build ===
    reporter.report(Progress::PhaseStart {
        name: "Final Build",
    });
    let solvated_script = template.solvate(outcome.best.point);
    let ions = match config.build.salt_concentration {
        Some(concentration) => estimate_ions(backend, &solvated_script, concentration)?,
        None => IonCounts::default(),
    };
    let final_script = solvated_script
        .ions(ions)
        .remove_residues(removed_residues.clone());
    let build_log = backend.build(&final_script)?;
    let solvated_path = work_dir.join(final_script.output_structure());
    let solvated = read_structure(&solvated_path)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Restraints ===
    reporter.report(Progress::PhaseStart {
        name: "Restraints",
    });
    let solute = solvated.leading_residues(solute_residues);
    let added_atoms = restraint::added_atoms_mask(
        &normalization.structure,
        &solute,
        config.restraint.match_strategy,
    );
    if let Err(e) = &added_atoms {
        warn!(error = %e, "Skipping restrained minimization input.");
    }

    let released = if config.restraint.release_added_atoms {
        added_atoms.as_ref().ok()
    } else {
        None
    };
    let reference = restraint::restraint_reference(&solvated, &config.restraint, released);
    let restraint_path = work_dir.join(RESTRAINT_REFERENCE_FILE);
    write_structure(&reference, &restraint_path)?;

    let minimization_input = match &added_atoms {
        Ok(mask) => {
            let path = work_dir.join(MINIMIZATION_INPUT_FILE);
            MinimizationInput::new(config.minimization.clone())
                .with_belly_mask(mask.to_string())
                .write_to_path(&path)
                .map_err(|source| EngineError::Io {
                    path: path.to_string_lossy().to_string(),
                    source,
                })?;
            Some(path)
        }
        Err(_) => None,
    };
    let regions = restraint::region_masks(&solvated, library, &config.restraint.ligand_residue);
    reporter.report(Progress::PhaseFinish);

    info!(
        solvent = outcome.best.observed_count,
        removed = removed_residues.len(),
        exact = outcome.is_exact(),
        "Preparation complete."
    );

    Ok(PreparationResult {
        normalization,
        calibration: outcome,
        removed_residues,
        ions,
        build_log,
        added_atoms,
        regions,
        files: PreparedFiles {
            receptor: receptor_path,
            solvated: solvated_path,
            restraint_reference: restraint_path,
            minimization_input,
        },
    })
}

/// Builds the calibrated box once more to read its net charge and size the ion shell.
fn estimate_ions<B: LeapBackend + ?Sized>(
    backend: &mut B,
    script: &LeapScript,
    concentration: f64,
) -> Result<IonCounts, EngineError> {
    let log = backend.build(script)?;
    let ions = log.ion_counts(concentration).unwrap_or_else(|| {
        warn!("Build log holds no solvent count; adding no ions.");
        IonCounts::default()
    });
    info!(
        sodium = ions.sodium,
        chloride = ions.chloride,
        "Estimated ion counts."
    );
    Ok(ions)
}

fn structure_error(path: &Path, source: PdbError) -> EngineError {
    EngineError::Structure {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

fn write_structure(structure: &Structure, path: &Path) -> Result<(), EngineError> {
    PdbFile::write_to_path(structure, path).map_err(|e| structure_error(path, e))
}

fn read_structure(path: &Path) -> Result<Structure, EngineError> {
    PdbFile::read_from_path(path).map_err(|e| structure_error(path, e))
}
