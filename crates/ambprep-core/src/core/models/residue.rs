use super::atom::{AtomRecord, ResidueKey};
use super::structure::StructureLine;

/// A borrowed view of one residue of a [`Structure`](super::structure::Structure).
#[derive(Debug, Clone, PartialEq)]
pub struct Residue<'a> {
    pub key: ResidueKey,
    pub name: &'a str,
    pub atoms: Vec<&'a AtomRecord>,
}

impl<'a> Residue<'a> {
    pub fn number(&self) -> i32 {
        self.key.sequence_number
    }

    pub fn atom_by_name(&self, name: &str) -> Option<&'a AtomRecord> {
        self.atoms.iter().copied().find(|atom| atom.name == name)
    }
}

pub(crate) fn group_residues(lines: &[StructureLine]) -> Vec<Residue<'_>> {
    let mut residues: Vec<Residue<'_>> = Vec::new();
    let mut open = false;

    for line in lines {
        match line {
            StructureLine::Atom(record) => {
                let key = record.residue_key();
                match residues.last_mut() {
                    Some(current) if open && current.key == key => current.atoms.push(record),
                    _ => {
                        residues.push(Residue {
                            key,
                            name: &record.residue_name,
                            atoms: vec![record],
                        });
                        open = true;
                    }
                }
            }
            StructureLine::Terminator(_) => open = false,
            StructureLine::Other(_) => {}
        }
    }
    residues
}
