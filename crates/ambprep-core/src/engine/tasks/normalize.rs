use crate::core::library::registry::{AMIDE_HYDROGEN, ReferenceLibrary};
use crate::core::models::atom::AtomRecord;
use crate::core::models::chain::{ChainStarts, ChainTracker};
use crate::core::models::structure::{Structure, StructureLine};
use crate::core::utils::identifiers::{is_hydrogen_name, normalize_atom_name};
use crate::engine::config::NormalizeConfig;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// A hydrogen the library does not list for its residue, or the amide hydrogen of
    /// the first residue of a chain.
    UnrecognizedHydrogen,
    /// Any hydrogen, removed because hydrogens are not kept.
    StrippedHydrogen,
    UnrecognizedHeavyAtom,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::UnrecognizedHydrogen => write!(f, "unrecognized hydrogen"),
            RemovalReason::StrippedHydrogen => write!(f, "hydrogen stripped"),
            RemovalReason::UnrecognizedHeavyAtom => write!(f, "unrecognized heavy atom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedAtom {
    pub record: AtomRecord,
    pub normalized_name: String,
    pub reason: RemovalReason,
}

/// Non-fatal findings of a normalization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// The residue type is absent from the reference library; its records were kept
    /// unfiltered.
    UnknownResidue { residue_name: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeWarning::UnknownResidue { residue_name } => write!(
                f,
                "residue '{residue_name}' is not in the reference library; its atoms were kept"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationReport {
    pub structure: Structure,
    pub removed: Vec<RemovedAtom>,
    pub warnings: Vec<NormalizeWarning>,
}

impl NormalizationReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Reduces a structure to what the build tool accepts: atom records and terminators,
/// closed by a terminator.
pub fn prepare_receptor(structure: &Structure) -> Structure {
    structure.receptor_lines()
}

/// Filters the polymer atom records of a structure against the reference library.
///
/// Only `ATOM` records are examined; heterogen records (ligands, ions, crystal waters)
/// and every non-atom line pass through unchanged and in order. For a residue known to
/// the library, a heavy atom is kept when its digit-normalized name is listed. Without
/// `keep_hydrogens` every hydrogen is dropped; with it, a hydrogen is kept when listed,
/// except the amide `H` of the first residue of a chain, which the build tool rebuilds
/// as part of the charged terminus.
///
/// Residues missing from the library are kept whole and reported once per residue
/// name. The returned structure always ends its atom records with a terminator.
#[instrument(skip_all, name = "normalize_task")]
pub fn run(
    structure: &Structure,
    library: &ReferenceLibrary,
    config: &NormalizeConfig,
) -> NormalizationReport {
    let first_residues = ChainStarts::collect(structure.lines());
    let mut tracker = ChainTracker::new();
    let mut reported: HashSet<&str> = HashSet::new();

    let mut kept = Vec::with_capacity(structure.lines().len());
    let mut removed = Vec::new();
    let mut warnings = Vec::new();

    for line in structure.lines() {
        let position = tracker.observe(line);
        let (StructureLine::Atom(record), Some(position)) = (line, position) else {
            kept.push(line.clone());
            continue;
        };

        let Some(known_names) = library.get(&record.residue_name) else {
            if reported.insert(record.residue_name.as_str()) {
                warn!(
                    residue = %record.residue_name,
                    "Residue is not in the reference library; keeping its atoms unfiltered."
                );
                warnings.push(NormalizeWarning::UnknownResidue {
                    residue_name: record.residue_name.clone(),
                });
            }
            kept.push(line.clone());
            continue;
        };

        let name = normalize_atom_name(&record.name);
        let is_chain_start =
            first_residues.is_first_residue(position.chain, &record.residue_key());
        match removal_reason(&name, is_chain_start, known_names, config) {
            Some(reason) => removed.push(RemovedAtom {
                record: record.clone(),
                normalized_name: name,
                reason,
            }),
            None => {
                let mut emitted = record.clone();
                if config.rename_atoms {
                    emitted.name = name;
                }
                kept.push(StructureLine::Atom(emitted));
            }
        }
    }

    let mut normalized = Structure::from_lines(kept);
    normalized.ensure_terminated();

    info!(
        removed = removed.len(),
        unknown_residues = warnings.len(),
        "Structure normalization complete."
    );

    NormalizationReport {
        structure: normalized,
        removed,
        warnings,
    }
}

fn removal_reason(
    name: &str,
    is_chain_start: bool,
    known_names: &HashSet<String>,
    config: &NormalizeConfig,
) -> Option<RemovalReason> {
    if is_hydrogen_name(name) {
        let is_terminal_amide = is_chain_start && name == AMIDE_HYDROGEN;
        let recognized = known_names.contains(name) && !is_terminal_amide;
        if !config.keep_hydrogens {
            Some(RemovalReason::StrippedHydrogen)
        } else if !recognized {
            Some(RemovalReason::UnrecognizedHydrogen)
        } else {
            None
        }
    } else if known_names.contains(name) {
        None
    } else {
        Some(RemovalReason::UnrecognizedHeavyAtom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::pdb::PdbFile;
    use crate::core::models::atom::RecordType;
    use nalgebra::Point3;

    const ALA_NAMES: [&str; 10] = ["N", "CA", "C", "O", "CB", "H", "HA", "HB1", "HB2", "HB3"];

    fn library() -> ReferenceLibrary {
        ReferenceLibrary::from_entries([("ALA", ALA_NAMES)])
    }

    fn atom(serial: u32, name: &str, res_name: &str, chain: char, res_num: i32) -> StructureLine {
        StructureLine::Atom(AtomRecord::new(
            serial,
            name,
            res_name,
            chain,
            res_num,
            Point3::new(serial as f64, 0.0, 0.0),
        ))
    }

    fn alanine(first_serial: u32, chain: char, res_num: i32) -> Vec<StructureLine> {
        ["N", "H", "CA", "HA", "CB", "1HB", "2HB", "3HB", "HX", "C", "O"]
            .iter()
            .enumerate()
            .map(|(i, name)| atom(first_serial + i as u32, name, "ALA", chain, res_num))
            .collect()
    }

    fn kept_names(structure: &Structure) -> Vec<String> {
        structure.atoms().map(|a| a.name.clone()).collect()
    }

    #[test]
    fn stripping_hydrogens_keeps_only_recognized_heavy_atoms() {
        let structure = Structure::from_lines(alanine(1, 'A', 1));
        let report = run(&structure, &library(), &NormalizeConfig::default());
        assert_eq!(kept_names(&report.structure), vec!["N", "CA", "CB", "C", "O"]);
        assert_eq!(report.removed_count(), 6);
        assert!(
            report
                .removed
                .iter()
                .all(|a| a.reason == RemovalReason::StrippedHydrogen)
        );
        assert!(report.removed.iter().any(|a| a.normalized_name == "HX"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn kept_hydrogens_are_filtered_and_terminal_amide_dropped() {
        let mut lines = alanine(1, 'A', 1);
        lines.extend(alanine(20, 'A', 2));
        let structure = Structure::from_lines(lines);
        let config = NormalizeConfig {
            keep_hydrogens: true,
            rename_atoms: false,
        };
        let report = run(&structure, &library(), &config);

        let first: Vec<&str> = report
            .structure
            .atoms()
            .filter(|a| a.residue_number == 1)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(first, vec!["N", "CA", "HA", "CB", "1HB", "2HB", "3HB", "C", "O"]);
        let second_has_amide = report
            .structure
            .atoms()
            .any(|a| a.residue_number == 2 && a.name == "H");
        assert!(second_has_amide);

        let reasons: Vec<(i32, &str, RemovalReason)> = report
            .removed
            .iter()
            .map(|a| (a.record.residue_number, a.normalized_name.as_str(), a.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (1, "H", RemovalReason::UnrecognizedHydrogen),
                (1, "HX", RemovalReason::UnrecognizedHydrogen),
                (2, "HX", RemovalReason::UnrecognizedHydrogen),
            ]
        );
    }

    #[test]
    fn every_chain_start_loses_its_amide_hydrogen() {
        let mut lines = alanine(1, 'A', 1);
        lines.push(StructureLine::Terminator("TER".into()));
        lines.extend(alanine(20, 'B', 1));
        let config = NormalizeConfig {
            keep_hydrogens: true,
            rename_atoms: false,
        };
        let report = run(&Structure::from_lines(lines), &library(), &config);
        assert!(!report.structure.atoms().any(|a| a.name == "H"));
    }

    #[test]
    fn rename_atoms_writes_back_rotated_names() {
        let config = NormalizeConfig {
            keep_hydrogens: true,
            rename_atoms: true,
        };
        let report = run(&Structure::from_lines(alanine(1, 'A', 1)), &library(), &config);
        let names = kept_names(&report.structure);
        assert!(names.contains(&"HB1".to_string()));
        assert!(!names.iter().any(|n| n.starts_with('1')));
    }

    #[test]
    fn emitted_atoms_of_known_residues_are_recognized() {
        let mut lines = alanine(1, 'A', 1);
        lines.push(atom(50, "OXT", "ALA", 'A', 1));
        lines.push(atom(51, "ZN", "ALA", 'A', 1));
        let config = NormalizeConfig {
            keep_hydrogens: true,
            rename_atoms: false,
        };
        let library = library();
        let report = run(&Structure::from_lines(lines), &library, &config);
        for atom in report.structure.atoms() {
            assert!(library.recognizes("ALA", &normalize_atom_name(&atom.name)));
        }
        let heavy: Vec<&str> = report
            .removed
            .iter()
            .filter(|a| a.reason == RemovalReason::UnrecognizedHeavyAtom)
            .map(|a| a.normalized_name.as_str())
            .collect();
        assert_eq!(heavy, vec!["OXT", "ZN"]);
    }

    #[test]
    fn structure_of_unknown_residues_is_unchanged() {
        let lines = vec![
            StructureLine::Other("REMARK unknown".into()),
            atom(1, "C1", "XYZ", 'A', 1),
            atom(2, "H1", "XYZ", 'A', 1),
            atom(3, "C1", "XYZ", 'A', 2),
            StructureLine::Terminator("TER".into()),
        ];
        let structure = Structure::from_lines(lines);
        let report = run(&structure, &library(), &NormalizeConfig::default());
        assert_eq!(report.removed_count(), 0);
        assert_eq!(report.structure, structure);
        assert_eq!(
            report.warnings,
            vec![NormalizeWarning::UnknownResidue {
                residue_name: "XYZ".to_string()
            }]
        );
    }

    #[test]
    fn heterogen_records_and_headers_pass_through_in_order() {
        let mut ligand = AtomRecord::new(30, "H1", "ALA", 'L', 9, Point3::origin());
        ligand.record_type = RecordType::Hetatm;
        let mut lines = vec![StructureLine::Other("REMARK header".into())];
        lines.extend(alanine(1, 'A', 1));
        lines.push(StructureLine::Atom(ligand.clone()));
        lines.push(StructureLine::Other("END".into()));

        let report = run(
            &Structure::from_lines(lines),
            &library(),
            &NormalizeConfig::default(),
        );
        let out = report.structure.lines();
        assert_eq!(out[0].render(), "REMARK header");
        assert_eq!(out[out.len() - 3].as_atom(), Some(&ligand));
        assert!(out[out.len() - 2].is_terminator());
        assert_eq!(out[out.len() - 1].render(), "END");
    }

    #[test]
    fn kept_records_are_written_back_byte_for_byte() {
        let kept = [
            "REMARK   1 PREPARED BY HAND",
            "ATOM      1  N   ALA A   1       1.000   2.000   3.000",
            "ATOM      2  CA  ALA A   1       1.5     2.25    3.125  1.0   0.0",
            "HETATM    3 FE   HEM A   2      10.000  11.000  12.000  1.00 20.00          FE",
            "TER",
            "END",
        ];
        let hydrogen = "ATOM      9 1HB  ALA A   1       0.000   0.000   0.000";
        let mut input_lines = kept.to_vec();
        input_lines.insert(3, hydrogen);
        let input = input_lines.join("\n") + "\n";

        let structure = PdbFile::parse_str(&input).unwrap();
        let report = run(&structure, &library(), &NormalizeConfig::default());

        assert_eq!(report.removed_count(), 1);
        assert_eq!(PdbFile::render(&report.structure), kept.join("\n") + "\n");
    }

    #[test]
    fn output_has_exactly_one_closing_terminator() {
        let mut lines = alanine(1, 'A', 1);
        lines.push(StructureLine::Terminator("TER".into()));
        let report = run(
            &Structure::from_lines(lines),
            &library(),
            &NormalizeConfig::default(),
        );
        let terminators = report
            .structure
            .lines()
            .iter()
            .filter(|l| l.is_terminator())
            .count();
        assert_eq!(terminators, 1);
        assert!(report.structure.lines().last().unwrap().is_terminator());
    }

    #[test]
    fn normalizing_twice_removes_nothing_more() {
        let config = NormalizeConfig {
            keep_hydrogens: true,
            rename_atoms: true,
        };
        let library = library();
        let mut lines = alanine(1, 'A', 1);
        lines.extend(alanine(20, 'A', 2));
        let once = run(&Structure::from_lines(lines), &library, &config);
        let twice = run(&once.structure, &library, &config);
        assert_eq!(twice.removed_count(), 0);
        assert_eq!(twice.structure, once.structure);
    }

    #[test]
    fn prepare_receptor_drops_headers() {
        let mut lines = vec![StructureLine::Other("CRYST1".into())];
        lines.extend(alanine(1, 'A', 1));
        let receptor = prepare_receptor(&Structure::from_lines(lines));
        assert!(
            receptor
                .lines()
                .iter()
                .all(|l| !matches!(l, StructureLine::Other(_)))
        );
        assert!(receptor.lines().last().unwrap().is_terminator());
    }
}
