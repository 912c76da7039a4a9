//! Algorithms of the preparation pipeline.
//!
//! Each submodule exposes a `run`-style entry point that operates on plain structures
//! and configuration values, so the tasks can be driven individually (as the CLI
//! subcommands do) or chained by [`crate::workflows::prepare`].

pub mod calibration;
pub mod normalize;
pub mod restraint;
