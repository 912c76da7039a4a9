//! # Core Module
//!
//! Data models and file formats shared by every stage of the preparation pipeline.
//!
//! ## Overview
//!
//! Structures are kept as ordered sequences of lines so that records the pipeline does
//! not interpret (headers, `END`, connectivity) survive a read/write cycle, while atom
//! records are decoded into typed fields.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atom records, residue and chain views,
//!   and the line-oriented `Structure`
//! - **File I/O** ([`io`]) - The fixed-column PDB codec behind the `StructureFile` trait
//! - **Reference Library** ([`library`]) - Recognized residues and their atom names
//! - **Identifiers** ([`utils`]) - Atom and residue name tables and name normalization

pub mod io;
pub mod library;
pub mod models;
pub mod utils;
