use thiserror::Error;

use super::config::ConfigError;
use super::oracle::OracleError;
use crate::core::io::pdb::PdbError;
use crate::core::library::registry::LibraryLoadError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Solvation oracle failed: {source}")]
    Oracle {
        #[from]
        source: OracleError,
    },

    #[error(
        "Calibration did not converge at distance {distance:.2} after {iterations} oracle calls"
    )]
    CalibrationUnconverged { distance: f64, iterations: usize },

    #[error("Residue alignment mismatch: {before} residues before processing, {after} after")]
    ResidueAlignmentMismatch { before: usize, after: usize },

    #[error("Structure file error for '{path}': {source}")]
    Structure {
        path: String,
        #[source]
        source: PdbError,
    },

    #[error("Reference library error: {source}")]
    Library {
        #[from]
        source: LibraryLoadError,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
