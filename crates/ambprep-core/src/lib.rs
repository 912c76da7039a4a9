//! # ambprep Core Library
//!
//! Preparation of macromolecular structures for AMBER-style simulations: structure
//! normalization against a residue reference library, calibration of the solvation box
//! against a requested solvent count, and derivation of the restraint and region masks
//! consumed by a restrained minimization.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `AtomRecord`),
//!   the fixed-column PDB codec, the reference residue library and identifier tables.
//!
//! - **[`engine`]: The Logic Core.** Configuration, the build-script model and its
//!   process runner, the solvation oracle abstraction and the individual tasks
//!   (`normalize`, `calibration`, `restraint`).
//!
//! - **[`workflows`]: The Public API.** Chains the engine tasks into a complete
//!   preparation run inside a working directory.

pub mod core;
pub mod engine;
pub mod workflows;
