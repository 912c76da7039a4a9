//! # Core Models Module
//!
//! Data structures describing a macromolecular structure as it is read from, and
//! written back to, a fixed-column structure file.
//!
//! ## Overview
//!
//! Unlike a fully resolved molecular graph, the structures handled here stay close to
//! the file they came from: a [`structure::Structure`] is an ordered list of lines in
//! which atom records are decoded into typed fields while terminators and every other
//! record are carried verbatim. This keeps the output of every preparation step
//! byte-compatible with the external programs that consume it.
//!
//! ## Key Components
//!
//! - [`atom`] - The typed `ATOM`/`HETATM` record and its fixed-width codec
//! - [`structure`] - Ordered structure lines and whole-structure operations
//! - [`residue`] - Borrowed residue views grouped from contiguous atom runs
//! - [`chain`] - Chain ordinal tracking and first-residue detection
//!
//! ## Usage
//!
//! ```ignore
//! use ambprep::core::models::atom::AtomRecord;
//!
//! let record = AtomRecord::parse(line)?;
//! assert_eq!(AtomRecord::parse(&record.to_line())?, record);
//! ```

pub mod atom;
pub mod chain;
pub mod residue;
pub mod structure;
