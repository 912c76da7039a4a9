//! Provides input/output functionality for fixed-column structure files.
//!
//! The [`traits::StructureFile`] trait is the common interface; [`pdb::PdbFile`] is
//! the implementation used throughout the preparation pipeline, both for the input
//! structure and for the structures written back by the external build tool.

pub mod pdb;
pub mod traits;
