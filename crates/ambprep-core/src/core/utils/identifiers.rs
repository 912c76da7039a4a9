use phf::{Set, phf_set};

/// Backbone heavy atoms that receive the strong positional restraint.
static RESTRAINED_BACKBONE_NAMES: Set<&'static str> = phf_set! {
    "N", "CA", "C", "O",
};

static SOLVENT_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "WAT", "HOH",
};

/// Residues whose backbone nitrogen carries no amide hydrogen.
pub(crate) static NO_AMIDE_HYDROGEN_RESIDUES: Set<&'static str> = phf_set! {
    "PRO",
};

/// Capping residues registered in the reference library with no atoms of their own.
pub(crate) static EMPTY_RESIDUES: Set<&'static str> = phf_set! {
    "NME",
};

/// Residue name the build tool gives to the solvent it adds.
pub const WATER_RESIDUE_NAME: &str = "WAT";

pub fn is_restrained_backbone_atom(atom_name: &str) -> bool {
    RESTRAINED_BACKBONE_NAMES.contains(atom_name.trim())
}

pub fn is_solvent_residue(residue_name: &str) -> bool {
    SOLVENT_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn is_hydrogen_name(atom_name: &str) -> bool {
    atom_name.starts_with('H')
}

/// Canonicalizes an atom name by moving a leading digit to the end (`1HB` becomes `HB1`).
///
/// Only the first character is rotated; names without a leading digit are returned
/// unchanged.
pub fn normalize_atom_name(atom_name: &str) -> String {
    let name = atom_name.trim();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_digit() => {
            let mut rotated: String = chars.collect();
            rotated.push(first);
            rotated
        }
        _ => name.to_string(),
    }
}
