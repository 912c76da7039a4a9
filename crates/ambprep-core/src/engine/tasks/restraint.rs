use crate::core::library::registry::ReferenceLibrary;
use crate::core::models::atom::AtomRecord;
use crate::core::models::residue::Residue;
use crate::core::models::structure::{Structure, StructureLine};
use crate::core::utils::identifiers::{
    WATER_RESIDUE_NAME, is_restrained_backbone_atom, is_solvent_residue, normalize_atom_name,
};
use crate::engine::config::{MatchStrategy, RestraintConfig};
use crate::engine::error::EngineError;
use std::fmt;
use tracing::{info, instrument};

const SELECTOR_SEPARATOR: &str = " | ";

/// A single `:<residue>@<atom>` selector term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomSelector {
    pub residue_number: i32,
    pub atom_name: String,
}

impl AtomSelector {
    pub fn matches(&self, record: &AtomRecord) -> bool {
        self.residue_number == record.residue_number && self.atom_name == record.name
    }
}

impl fmt::Display for AtomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}@{}", self.residue_number, self.atom_name)
    }
}

/// An OR-combination of atom selectors, rendered as terms joined by ` | `.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestraintMask {
    selectors: Vec<AtomSelector>,
}

impl RestraintMask {
    pub fn new(selectors: Vec<AtomSelector>) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &[AtomSelector] {
        &self.selectors
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn contains(&self, record: &AtomRecord) -> bool {
        self.selectors.iter().any(|selector| selector.matches(record))
    }
}

impl fmt::Display for RestraintMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(SELECTOR_SEPARATOR)?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

fn same_atom(before: &AtomRecord, after: &AtomRecord, strategy: MatchStrategy) -> bool {
    match strategy {
        MatchStrategy::Identity => {
            normalize_atom_name(&before.name) == normalize_atom_name(&after.name)
        }
        MatchStrategy::Coordinates => before.coordinate_field() == after.coordinate_field(),
    }
}

fn added_in_residue<'a>(
    before: &Residue<'_>,
    after: &Residue<'a>,
    strategy: MatchStrategy,
) -> impl Iterator<Item = &'a AtomRecord> {
    after.atoms.iter().copied().filter(move |candidate| {
        !before
            .atoms
            .iter()
            .any(|existing| same_atom(existing, candidate, strategy))
    })
}

/// Selects the atoms the build tool introduced into a structure.
///
/// Both structures are grouped into residues, which must pair up one to one by
/// position. Within each residue pair, an atom of `after` is new when no atom of the
/// `before` residue matches it under `strategy`. Residue numbers and atom names of the
/// selectors come from `after`.
///
/// # Errors
///
/// Returns [`EngineError::ResidueAlignmentMismatch`] when the residue counts differ.
#[instrument(skip_all, name = "added_atoms_mask_task", fields(strategy = %strategy))]
pub fn added_atoms_mask(
    before: &Structure,
    after: &Structure,
    strategy: MatchStrategy,
) -> Result<RestraintMask, EngineError> {
    let before_residues = before.residues();
    let after_residues = after.residues();
    if before_residues.len() != after_residues.len() {
        return Err(EngineError::ResidueAlignmentMismatch {
            before: before_residues.len(),
            after: after_residues.len(),
        });
    }

    let selectors: Vec<AtomSelector> = before_residues
        .iter()
        .zip(&after_residues)
        .flat_map(|(b, a)| added_in_residue(b, a, strategy))
        .map(|record| AtomSelector {
            residue_number: record.residue_number,
            atom_name: record.name.clone(),
        })
        .collect();

    info!(
        added = selectors.len(),
        residues = after_residues.len(),
        "Identified atoms added by the build tool."
    );
    Ok(RestraintMask::new(selectors))
}

/// Positional restraint force for one atom.
///
/// Backbone heavy atoms of residues that are neither solvent nor the ligand get
/// `config.force`; every other atom gets zero. With `config.serials` set, atoms outside
/// that set get zero, and atoms selected by `released` get zero as well.
pub fn restraint_force(
    record: &AtomRecord,
    config: &RestraintConfig,
    released: Option<&RestraintMask>,
) -> f64 {
    if config
        .serials
        .as_ref()
        .is_some_and(|serials| !serials.contains(&record.serial))
    {
        return 0.0;
    }
    if released.is_some_and(|mask| mask.contains(record)) {
        return 0.0;
    }
    let restrained = is_restrained_backbone_atom(&record.name)
        && !is_solvent_residue(&record.residue_name)
        && record.residue_name != config.ligand_residue;
    if restrained { config.force } else { 0.0 }
}

/// Builds the force-weighted reference structure read by the external minimizer.
///
/// Every atom record carries its restraint force in columns 31-38 in place of the x
/// coordinate; all other lines are copied unchanged.
pub fn restraint_reference(
    structure: &Structure,
    config: &RestraintConfig,
    released: Option<&RestraintMask>,
) -> Structure {
    structure
        .lines()
        .iter()
        .map(|line| match line {
            StructureLine::Atom(record) => {
                let mut weighted = record.clone();
                weighted.position.x = restraint_force(record, config, released);
                StructureLine::Atom(weighted)
            }
            other => other.clone(),
        })
        .collect()
}

/// Residue selections for the protein, ligand and water regions of a structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionMasks {
    /// `:<first>-<last>` over residues known to the reference library.
    pub protein: Option<String>,
    /// `:<n>` for the first ligand residue.
    pub ligand: Option<String>,
    /// `:<first>-<last>` over water residues.
    pub water: Option<String>,
}

#[derive(Default)]
struct Span {
    first: Option<String>,
    last: Option<String>,
}

impl Span {
    fn extend(&mut self, label: String) {
        if self.first.is_none() {
            self.first = Some(label.clone());
        }
        self.last = Some(label);
    }

    fn mask(self) -> Option<String> {
        Some(format!(":{}-{}", self.first?, self.last?))
    }
}

fn residue_label(record: &AtomRecord) -> String {
    if record.insertion_code == ' ' {
        record.residue_number.to_string()
    } else {
        format!("{}{}", record.residue_number, record.insertion_code)
    }
}

/// Derives the region masks of a (typically solvated) structure.
///
/// Regions are spans in file order: the first and last residue seen of each kind. The
/// ligand region is the first residue named `ligand_residue`.
pub fn region_masks(
    structure: &Structure,
    library: &ReferenceLibrary,
    ligand_residue: &str,
) -> RegionMasks {
    let mut protein = Span::default();
    let mut water = Span::default();
    let mut ligand = None;

    for record in structure.atoms() {
        let name = record.residue_name.as_str();
        if name == ligand_residue && ligand.is_none() {
            ligand = Some(format!(":{}", residue_label(record)));
        } else if name == WATER_RESIDUE_NAME {
            water.extend(residue_label(record));
        } else if library.contains_residue(name) {
            protein.extend(residue_label(record));
        }
    }

    RegionMasks {
        protein: protein.mask(),
        ligand,
        water: water.mask(),
    }
}
