use super::atom::AtomRecord;
use super::residue::{Residue, group_residues};

const TERMINATOR_TAG: &str = "TER";

/// One line of a structure file.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureLine {
    /// A decoded `ATOM`/`HETATM` record.
    Atom(AtomRecord),
    /// A chain terminator (`TER`), kept exactly as read.
    Terminator(String),
    /// Any other record (`REMARK`, `CRYST1`, `END`, ...), kept exactly as read.
    Other(String),
}

impl StructureLine {
    pub fn is_terminator(&self) -> bool {
        matches!(self, StructureLine::Terminator(_))
    }

    pub fn as_atom(&self) -> Option<&AtomRecord> {
        match self {
            StructureLine::Atom(record) => Some(record),
            _ => None,
        }
    }

    /// Renders the line for writing (without newline).
    pub fn render(&self) -> String {
        match self {
            StructureLine::Atom(record) => record.to_line(),
            StructureLine::Terminator(raw) | StructureLine::Other(raw) => raw.clone(),
        }
    }
}

/// An ordered macromolecular structure.
///
/// Line order is significant: residues are contiguous runs of atom records and chains
/// are delimited by terminator records, so every operation preserves the order of the
/// lines it keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    lines: Vec<StructureLine>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<StructureLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[StructureLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<StructureLine> {
        self.lines
    }

    pub fn push(&mut self, line: StructureLine) {
        self.lines.push(line);
    }

    pub fn push_atom(&mut self, record: AtomRecord) {
        self.lines.push(StructureLine::Atom(record));
    }

    pub fn push_terminator(&mut self) {
        self.lines
            .push(StructureLine::Terminator(TERMINATOR_TAG.to_string()));
    }

    /// Iterates over the atom records in file order.
    pub fn atoms(&self) -> impl Iterator<Item = &AtomRecord> {
        self.lines.iter().filter_map(StructureLine::as_atom)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms().count()
    }

    /// Groups the atom records into residues.
    ///
    /// A residue is a contiguous run of atoms sharing chain identifier, sequence number
    /// and insertion code; a terminator always closes the current residue.
    pub fn residues(&self) -> Vec<Residue<'_>> {
        group_residues(&self.lines)
    }

    pub fn residue_count(&self) -> usize {
        self.residues().len()
    }

    /// Makes sure the last atom record is followed by a terminator.
    ///
    /// Trailing non-atom records such as `END` stay after the inserted terminator.
    ///
    /// # Return
    ///
    /// Returns `true` when a terminator had to be added.
    pub fn ensure_terminated(&mut self) -> bool {
        let last_record = self
            .lines
            .iter()
            .rposition(|line| !matches!(line, StructureLine::Other(_)));
        match last_record {
            Some(index) if self.lines[index].is_terminator() => false,
            Some(index) => {
                self.lines.insert(
                    index + 1,
                    StructureLine::Terminator(TERMINATOR_TAG.to_string()),
                );
                true
            }
            None => {
                self.push_terminator();
                true
            }
        }
    }

    /// Returns a copy that keeps only atom and terminator lines, closed by a terminator.
    ///
    /// Headers, connectivity and `END` records are dropped; the external build tool
    /// rejects several of them and regenerates what it needs.
    pub fn receptor_lines(&self) -> Structure {
        let mut receptor = Structure::from_lines(
            self.lines
                .iter()
                .filter(|line| !matches!(line, StructureLine::Other(_)))
                .cloned()
                .collect(),
        );
        receptor.ensure_terminated();
        receptor
    }

    /// Returns a copy containing only the first `count` residues.
    ///
    /// Terminators between kept residues are preserved and the result is closed by a
    /// terminator. Useful to isolate the solute part of a solvated build, which the
    /// build tool always writes ahead of the solvent.
    pub fn leading_residues(&self, count: usize) -> Structure {
        let mut kept = Vec::new();
        let mut seen = 0usize;
        let mut previous = None;
        let mut closed = true;
        for line in &self.lines {
            match line {
                StructureLine::Atom(record) => {
                    let key = record.residue_key();
                    if closed || previous != Some(key) {
                        seen += 1;
                        previous = Some(key);
                        closed = false;
                    }
                    if seen > count {
                        break;
                    }
                    kept.push(line.clone());
                }
                StructureLine::Terminator(_) => {
                    closed = true;
                    if seen <= count && seen > 0 {
                        kept.push(line.clone());
                    }
                }
                StructureLine::Other(_) => {}
            }
        }
        let mut structure = Structure::from_lines(kept);
        structure.ensure_terminated();
        structure
    }
}

impl FromIterator<StructureLine> for Structure {
    fn from_iter<I: IntoIterator<Item = StructureLine>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
