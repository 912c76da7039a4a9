use crate::core::io::traits::StructureFile;
use crate::core::models::atom::{AtomParseErrorKind, AtomRecord};
use crate::core::models::structure::{Structure, StructureLine};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: AtomParseErrorKind,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

fn record_tag(line: &str) -> &str {
    line.get(..6.min(line.len())).unwrap_or("").trim_end()
}

/// Fixed-column PDB reader and writer.
///
/// `ATOM`/`HETATM` lines are decoded into [`AtomRecord`]s; `TER` lines and every other
/// record are preserved verbatim so that untouched content survives a read/write cycle.
pub struct PdbFile;

impl PdbFile {
    /// Decodes a structure held in memory.
    pub fn parse_str(text: &str) -> Result<Structure, PdbError> {
        Self::read_from(&mut text.as_bytes())
    }

    /// Encodes a structure into a string, one record per line.
    pub fn render(structure: &Structure) -> String {
        let mut out = String::new();
        for line in structure.lines() {
            out.push_str(&line.render());
            out.push('\n');
        }
        out
    }
}

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::new();
        let mut atoms_read = 0usize;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line = line.trim_end_matches('\r').to_string();

            match record_tag(&line) {
                "ATOM" | "HETATM" => {
                    let record = AtomRecord::parse(&line).map_err(|kind| PdbError::Parse {
                        line: line_num + 1,
                        kind,
                    })?;
                    structure.push_atom(record);
                    atoms_read += 1;
                }
                "TER" => structure.push(StructureLine::Terminator(line)),
                _ => {
                    if !line.trim().is_empty() {
                        structure.push(StructureLine::Other(line));
                    }
                }
            }
        }

        if atoms_read == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        for line in structure.lines() {
            writeln!(writer, "{}", line.render())?;
        }
        Ok(())
    }
}
