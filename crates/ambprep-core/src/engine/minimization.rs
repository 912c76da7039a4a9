use super::config::MinimizationConfig;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// A `&cntrl` input file for the external minimizer.
///
/// When a belly mask is present only the selected atoms move; everything else is
/// frozen in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationInput {
    config: MinimizationConfig,
    belly_mask: Option<String>,
}

impl MinimizationInput {
    pub fn new(config: MinimizationConfig) -> Self {
        Self {
            config,
            belly_mask: None,
        }
    }

    /// Restricts the minimization to the atoms of `mask`. An empty mask is ignored.
    pub fn with_belly_mask(mut self, mask: impl Into<String>) -> Self {
        let mask = mask.into();
        self.belly_mask = (!mask.trim().is_empty()).then_some(mask);
        self
    }

    pub fn belly_mask(&self) -> Option<&str> {
        self.belly_mask.as_deref()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_namelist(&mut out);
        out
    }

    fn write_namelist(&self, out: &mut String) -> std::fmt::Result {
        let c = &self.config;
        writeln!(out, "{}", c.title)?;
        writeln!(out, "&cntrl")?;
        writeln!(out, " imin=1, maxcyc={},", c.max_cycles)?;
        writeln!(out, " ntb={},", c.periodic_boundary)?;
        writeln!(out, " ncyc={},", c.steepest_descent_cycles)?;
        writeln!(out, " ntmin={},", c.minimization_method)?;
        writeln!(out, " ntpr={},", c.print_frequency)?;
        writeln!(out, " cut={:.1},", c.cutoff)?;
        if let Some(mask) = &self.belly_mask {
            writeln!(out, " ibelly=1,")?;
            writeln!(out, " bellymask='{mask}',")?;
        }
        writeln!(out, "&end")
    }

    /// Writes the input file, flushing before returning.
    pub fn write_to_path(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(self.render().as_bytes())?;
        writer.flush()
    }
}
