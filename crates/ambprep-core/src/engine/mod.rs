//! # Engine Module
//!
//! This module implements the algorithms that turn a raw macromolecular structure into
//! the inputs of a solvated, restrained minimization.
//!
//! ## Overview
//!
//! The engine sits between the stateless [`crate::core`] layer and the end-to-end
//! [`crate::workflows`]. It drives the external structure-building tool through the
//! [`oracle`] abstraction, searches the solvation parameter grid, filters atom records
//! against the reference library and derives restraint selections from the difference
//! between structures before and after a build.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builders for every task and the full pipeline
//! - **Tasks** ([`tasks`]) - Calibration search, normalization and restraint derivation
//! - **Oracle** ([`oracle`]) - The solvation oracle trait and the `tleap` process runner
//! - **Build Scripts** ([`leap`]) - Script generation and log parsing for the build tool
//! - **Minimizer Input** ([`minimization`]) - `&cntrl` namelist writer
//! - **State** ([`state`]) - Calibration points, answers and outcomes
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod leap;
pub mod minimization;
pub mod oracle;
pub mod progress;
pub mod state;
pub mod tasks;
