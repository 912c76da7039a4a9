use super::config::{BuildConfig, DEFAULT_FORCEFIELD, DEFAULT_LIGAND_RESIDUE, LigandParameters};
use super::state::CalibrationPoint;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Ions added per solvent molecule and per mole of salt concentration.
const IONS_PER_SOLVENT_PER_MOLAR: f64 = 0.0187;

const NET_CHARGE_WARNING: &str = "WARNING: The unperturbed charge";

/// Stem of the parameter, coordinate and structure files saved by every build.
pub const DEFAULT_OUTPUT_STEM: &str = "start";

/// Sodium and chloride counts passed to `addions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IonCounts {
    pub sodium: usize,
    pub chloride: usize,
}

impl IonCounts {
    pub fn is_empty(&self) -> bool {
        self.sodium == 0 && self.chloride == 0
    }
}

/// A build script for the external structure-building tool.
///
/// The same script shape serves every build of the pipeline: plain structure loading,
/// the solvated builds issued during calibration, and the final build that also adds
/// ions and removes surplus solvent residues.
#[derive(Debug, Clone, PartialEq)]
pub struct LeapScript {
    structure: PathBuf,
    forcefield: String,
    ligand: Option<LigandParameters>,
    pb_radii: Option<String>,
    solvation: Option<CalibrationPoint>,
    ions: IonCounts,
    removals: Vec<usize>,
    output_stem: String,
}

impl LeapScript {
    pub fn new(structure: impl Into<PathBuf>) -> Self {
        Self {
            structure: structure.into(),
            forcefield: DEFAULT_FORCEFIELD.to_string(),
            ligand: None,
            pb_radii: None,
            solvation: None,
            ions: IonCounts::default(),
            removals: Vec::new(),
            output_stem: DEFAULT_OUTPUT_STEM.to_string(),
        }
    }

    /// Starts a script for `structure` using the force field and ligand settings of a
    /// build configuration.
    pub fn from_build_config(structure: impl Into<PathBuf>, config: &BuildConfig) -> Self {
        Self {
            forcefield: config.forcefield.clone(),
            ligand: config.ligand.clone(),
            pb_radii: config.pb_radii.clone(),
            ..Self::new(structure)
        }
    }

    pub fn forcefield(mut self, source: impl Into<String>) -> Self {
        self.forcefield = source.into();
        self
    }
    pub fn ligand(mut self, parameters: LigandParameters) -> Self {
        self.ligand = Some(parameters);
        self
    }
    pub fn pb_radii(mut self, radii: impl Into<String>) -> Self {
        self.pb_radii = Some(radii.into());
        self
    }
    pub fn solvate(mut self, point: CalibrationPoint) -> Self {
        self.solvation = Some(point);
        self
    }
    pub fn ions(mut self, ions: IonCounts) -> Self {
        self.ions = ions;
        self
    }
    pub fn remove_residues(mut self, residues: Vec<usize>) -> Self {
        self.removals = residues;
        self
    }
    pub fn output_stem(mut self, stem: impl Into<String>) -> Self {
        self.output_stem = stem.into();
        self
    }

    pub fn structure(&self) -> &Path {
        &self.structure
    }

    pub fn solvation(&self) -> Option<CalibrationPoint> {
        self.solvation
    }

    /// File name of the structure saved by the `savePdb` command.
    pub fn output_structure(&self) -> String {
        format!("{}.pdb", self.output_stem)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_commands(&mut out);
        out
    }

    fn write_commands(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "source {}", self.forcefield)?;
        if self.ligand.is_some() {
            writeln!(out, "source leaprc.gaff")?;
        }
        writeln!(out, "loadoff atomic_ions.lib")?;
        writeln!(out, "loadamberparams frcmod.ionsjc_tip3p")?;
        writeln!(out, "loadamberparams frcmod.ionslm_1264_tip3p")?;
        if let Some(ligand) = &self.ligand {
            writeln!(
                out,
                "{} = loadmol2 {}",
                DEFAULT_LIGAND_RESIDUE,
                ligand.mol2.display()
            )?;
            writeln!(out, "loadamberparams {}", ligand.frcmod.display())?;
        }
        if let Some(radii) = &self.pb_radii {
            writeln!(out, "set default PBRadii {radii}")?;
        }
        writeln!(out, "complex = loadPdb {}", self.structure.display())?;
        if let Some(point) = self.solvation {
            writeln!(
                out,
                "solvateBox complex TIP3PBOX {:.2} {:.2}",
                point.distance, point.closeness
            )?;
        }
        if self.ions.sodium > 0 {
            writeln!(out, "addions complex Na+ {}", self.ions.sodium)?;
        }
        if self.ions.chloride > 0 {
            writeln!(out, "addions complex Cl- {}", self.ions.chloride)?;
        }
        for residue in &self.removals {
            writeln!(out, "remove complex complex.{residue}")?;
        }
        writeln!(
            out,
            "saveAmberParm complex {stem}.prmtop {stem}.inpcrd",
            stem = self.output_stem
        )?;
        writeln!(out, "savePdb complex {}", self.output_structure())?;
        writeln!(out, "quit")
    }
}

/// The captured standard output of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeapLog {
    pub source: PathBuf,
    pub text: String,
}

impl LeapLog {
    pub fn new(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Number of residues added by `solvateBox`.
    ///
    /// Only a line made of exactly the three tokens `Added <N> residues.` counts; the
    /// first such line wins.
    pub fn added_residues(&self) -> Option<usize> {
        self.text.lines().find_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["Added", count, "residues."] => count.parse().ok(),
                _ => None,
            }
        })
    }

    /// Net charge of the built unit, rounded to the nearest integer.
    pub fn net_charge(&self) -> Option<i64> {
        self.text
            .lines()
            .filter(|line| line.starts_with(NET_CHARGE_WARNING))
            .find_map(|line| {
                line.split_whitespace()
                    .nth(7)
                    .and_then(|token| token.parse::<f64>().ok())
                    .map(|charge| charge.round() as i64)
            })
    }

    /// Estimates the ions needed for a salt concentration (mol/L) and to neutralize
    /// the unit.
    ///
    /// Returns `None` when the log holds no solvent count.
    pub fn ion_counts(&self, concentration: f64) -> Option<IonCounts> {
        let solvent = self.added_residues()?;
        let pairs = (solvent as f64 * concentration * IONS_PER_SOLVENT_PER_MOLAR).round() as usize;
        let mut ions = IonCounts {
            sodium: pairs,
            chloride: pairs,
        };
        match self.net_charge() {
            Some(charge) if charge > 0 => ions.chloride += charge.unsigned_abs() as usize,
            Some(charge) if charge < 0 => ions.sodium += charge.unsigned_abs() as usize,
            _ => {}
        }
        Some(ions)
    }
}
