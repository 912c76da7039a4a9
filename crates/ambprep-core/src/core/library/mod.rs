//! # Reference Library Module
//!
//! Loads the residue atom-naming table that the structure normalizer checks atom
//! records against.
//!
//! ## Key Components
//!
//! - [`registry::ReferenceLibrary`] - Immutable residue name to atom-name set mapping
//! - [`registry::LibraryLoadError`] - Failures while reading the table from disk

pub mod registry;
