use super::atom::{RecordType, ResidueKey};
use super::structure::StructureLine;
use std::collections::HashSet;

/// Position of an atom relative to the chain it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainPosition {
    /// Zero-based ordinal of the chain in file order.
    pub chain: usize,
    /// `true` for the first atom of a chain.
    pub starts_chain: bool,
}

/// Accumulator that assigns chain ordinals while folding over structure lines.
///
/// A chain opens at the first polymer (`ATOM`) record of the file and at the first
/// polymer record after every terminator. Heterogen records never open a chain.
#[derive(Debug, Clone, Default)]
pub struct ChainTracker {
    chains_seen: usize,
    open: bool,
}

impl ChainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the tracker by one line.
    ///
    /// # Return
    ///
    /// Returns the chain position of polymer atom records and `None` for every other
    /// line.
    pub fn observe(&mut self, line: &StructureLine) -> Option<ChainPosition> {
        match line {
            StructureLine::Atom(record) if record.record_type == RecordType::Atom => {
                Some(self.enter())
            }
            StructureLine::Terminator(_) => {
                self.open = false;
                None
            }
            _ => None,
        }
    }

    fn enter(&mut self) -> ChainPosition {
        let starts_chain = !self.open;
        if starts_chain {
            self.chains_seen += 1;
            self.open = true;
        }
        ChainPosition {
            chain: self.chains_seen - 1,
            starts_chain,
        }
    }
}

/// The first residue of every chain, keyed by chain ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStarts {
    residues: HashSet<(usize, ResidueKey)>,
}

impl ChainStarts {
    /// Pre-computes the first residue of each chain in a single pass.
    pub fn collect<'a>(lines: impl IntoIterator<Item = &'a StructureLine>) -> Self {
        let mut tracker = ChainTracker::new();
        let mut residues = HashSet::new();
        for line in lines {
            if let (Some(position), StructureLine::Atom(record)) = (tracker.observe(line), line) {
                if position.starts_chain {
                    residues.insert((position.chain, record.residue_key()));
                }
            }
        }
        Self { residues }
    }

    pub fn is_first_residue(&self, chain: usize, key: &ResidueKey) -> bool {
        self.residues.contains(&(chain, *key))
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}
