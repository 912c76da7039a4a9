use crate::core::utils::identifiers::{EMPTY_RESIDUES, NO_AMIDE_HYDROGEN_RESIDUES};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Name given to the placeholder entry added for the backbone amide hydrogen.
pub const AMIDE_HYDROGEN: &str = "H";

/// Column after which hydrogen lines list their atom names.
const HYDROGEN_NAMES_COLUMN: usize = 15;

#[derive(Debug, Error)]
pub enum LibraryLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Read error: {0}")]
    Read(#[from] io::Error),
    #[error("Line {line} lists atom names before any residue section was opened")]
    OrphanAtomLine { line: usize },
}

/// Reference atom-naming library: the atom names recognized for each residue type.
///
/// The library is built once per process and never mutated afterwards, so a single
/// instance can be shared by reference between concurrent preparation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceLibrary {
    residues: HashMap<String, HashSet<String>>,
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

enum LineKind<'a> {
    Residue(&'a str),
    Hydrogens(Vec<&'a str>),
    HeavyAtoms(Vec<&'a str>),
    Ignored,
}

fn classify(line: &str) -> LineKind<'_> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => LineKind::Ignored,
        [name, count] if is_numeric(count) => LineKind::Residue(name),
        _ if tokens.len() >= 4 && tokens[..4].iter().all(|t| is_numeric(t)) => {
            LineKind::Hydrogens(
                line.get(HYDROGEN_NAMES_COLUMN..)
                    .unwrap_or("")
                    .split_whitespace()
                    .collect(),
            )
        }
        [first, ..] if !is_numeric(first) => LineKind::HeavyAtoms(tokens),
        _ => LineKind::Ignored,
    }
}

impl ReferenceLibrary {
    /// Loads the library from a reference file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryLoadError::Io`] when the file cannot be opened and the parse
    /// errors of [`ReferenceLibrary::from_reader`] otherwise.
    pub fn load(path: &Path) -> Result<Self, LibraryLoadError> {
        let file = std::fs::File::open(path).map_err(|e| LibraryLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses the line-oriented reference format.
    ///
    /// The first line is a header and is skipped. A line made of exactly two tokens
    /// whose second token is numeric opens a residue section. Lines starting with four
    /// numeric tokens are hydrogen lines: their names are the tokens after column 15.
    /// Any other line not starting with a number lists heavy-atom names.
    ///
    /// After parsing, every residue except those without an amide hydrogen gains the
    /// `H` placeholder, and the capping residues without their own atom list are
    /// registered with an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryLoadError::OrphanAtomLine`] when atom names appear before the
    /// first residue section.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, LibraryLoadError> {
        let mut residues: HashMap<String, HashSet<String>> = HashMap::new();
        let mut current: Option<String> = None;

        for (index, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            let names = match classify(&line) {
                LineKind::Residue(name) => {
                    residues.entry(name.to_string()).or_default();
                    current = Some(name.to_string());
                    continue;
                }
                LineKind::Hydrogens(names) | LineKind::HeavyAtoms(names) => names,
                LineKind::Ignored => continue,
            };
            let residue = current
                .as_ref()
                .and_then(|name| residues.get_mut(name))
                .ok_or(LibraryLoadError::OrphanAtomLine { line: index + 1 })?;
            residue.extend(names.into_iter().map(str::to_string));
        }

        for (name, atoms) in residues.iter_mut() {
            if !NO_AMIDE_HYDROGEN_RESIDUES.contains(name.as_str()) {
                atoms.insert(AMIDE_HYDROGEN.to_string());
            }
        }
        for name in EMPTY_RESIDUES.iter() {
            residues.insert(name.to_string(), HashSet::new());
        }

        Ok(Self { residues })
    }

    /// Parses the reference format from an in-memory string.
    pub fn parse_str(text: &str) -> Result<Self, LibraryLoadError> {
        Self::from_reader(text.as_bytes())
    }

    /// Builds a library directly from residue/atom-name pairs, without implicit entries.
    pub fn from_entries<'a, I, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, A)>,
        A: IntoIterator<Item = &'a str>,
    {
        let residues = entries
            .into_iter()
            .map(|(name, atoms)| {
                (
                    name.to_string(),
                    atoms.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        Self { residues }
    }

    pub fn get(&self, residue_name: &str) -> Option<&HashSet<String>> {
        self.residues.get(residue_name)
    }

    pub fn contains_residue(&self, residue_name: &str) -> bool {
        self.residues.contains_key(residue_name)
    }

    /// Returns `true` when `atom_name` is listed for `residue_name`.
    pub fn recognizes(&self, residue_name: &str, atom_name: &str) -> bool {
        self.residues
            .get(residue_name)
            .is_some_and(|atoms| atoms.contains(atom_name))
    }

    /// Residue names in sorted order.
    pub fn residue_names(&self) -> BTreeSet<&str> {
        self.residues.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}
