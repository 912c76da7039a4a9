//! # Workflows Module
//!
//! High-level entry points that chain the engine tasks into complete runs.
//!
//! ## Overview
//!
//! A workflow owns the file layout of its working directory, decides which task
//! failures are fatal, and reports phase progress. Callers supply the input structure,
//! the reference library, a configuration and a [`LeapBackend`](crate::engine::oracle::LeapBackend)
//! that runs the external build tool.
//!
//! ## Architecture
//!
//! - **Preparation Workflow** ([`prepare`]) - Normalization, solvation calibration, the
//!   final solvated build and the restraint outputs for minimization.

pub mod prepare;
