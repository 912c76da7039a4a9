use super::leap::{LeapLog, LeapScript};
use super::state::CalibrationPoint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_LEAP_EXECUTABLE: &str = "tleap";
const SCRIPT_FILE_NAME: &str = "leap.in";
const LOG_FILE_NAME: &str = "leap.log";
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Failed to run '{program}': {reason}")]
    Invocation { program: String, reason: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("No 'Added <N> residues.' line found in '{path}'")]
    MissingCount { path: String },
}

/// Answers how many solvent molecules a solvation build places for a given point.
///
/// The calibration search treats the oracle as opaque: it only ever sees the count.
/// Closures with the matching signature implement the trait, which keeps test
/// oracles short.
pub trait SolvationOracle {
    fn solvate(&mut self, point: CalibrationPoint) -> Result<usize, OracleError>;
}

impl<F> SolvationOracle for F
where
    F: FnMut(CalibrationPoint) -> Result<usize, OracleError>,
{
    fn solvate(&mut self, point: CalibrationPoint) -> Result<usize, OracleError> {
        self(point)
    }
}

/// Executes build scripts and returns their captured log.
pub trait LeapBackend {
    /// Runs one build to completion.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Invocation`] when the build cannot be started or exits
    /// unsuccessfully and [`OracleError::Io`] when the script or log cannot be written
    /// or read back.
    fn build(&mut self, script: &LeapScript) -> Result<LeapLog, OracleError>;
}

/// Runs the `tleap` executable as a blocking child process.
///
/// The script is written to `leap.in` inside the working directory and the process is
/// started there, with its standard output redirected into `leap.log`.
#[derive(Debug, Clone)]
pub struct TleapRunner {
    executable: PathBuf,
    work_dir: PathBuf,
}

impl TleapRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_LEAP_EXECUTABLE),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    fn io_error(path: &Path, source: std::io::Error) -> OracleError {
        OracleError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }

    fn write_script(&self, script: &LeapScript) -> Result<PathBuf, OracleError> {
        let path = self.work_dir.join(SCRIPT_FILE_NAME);
        let file = File::create(&path).map_err(|e| Self::io_error(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(script.render().as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| Self::io_error(&path, e))?;
        Ok(path)
    }
}

impl LeapBackend for TleapRunner {
    fn build(&mut self, script: &LeapScript) -> Result<LeapLog, OracleError> {
        self.write_script(script)?;

        let log_path = self.work_dir.join(LOG_FILE_NAME);
        let output = {
            let log_file = File::create(&log_path).map_err(|e| Self::io_error(&log_path, e))?;
            let program = self.executable.display().to_string();
            debug!(program = %program, work_dir = %self.work_dir.display(), "Starting build");
            Command::new(&self.executable)
                .arg("-f")
                .arg(SCRIPT_FILE_NAME)
                .current_dir(&self.work_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::from(log_file))
                .stderr(Stdio::piped())
                .output()
                .map_err(|e| OracleError::Invocation {
                    program: program.clone(),
                    reason: e.to_string(),
                })?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut reason = format!("process exited with {}", output.status);
            let tail = stderr_tail(&stderr);
            if !tail.is_empty() {
                reason.push_str(": ");
                reason.push_str(&tail);
            }
            return Err(OracleError::Invocation {
                program: self.executable.display().to_string(),
                reason,
            });
        }

        let text =
            std::fs::read_to_string(&log_path).map_err(|e| Self::io_error(&log_path, e))?;
        Ok(LeapLog::new(log_path, text))
    }
}

/// Last few non-empty lines of the build tool's diagnostics, joined on one line.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" / ")
}

/// Solvation oracle backed by real builds of a template script.
///
/// Every query clones the template, sets its `solvateBox` parameters and reads the
/// solvent count from the resulting log.
pub struct LeapOracle<'a, B: LeapBackend + ?Sized> {
    backend: &'a mut B,
    template: &'a LeapScript,
}

impl<'a, B: LeapBackend + ?Sized> LeapOracle<'a, B> {
    pub fn new(backend: &'a mut B, template: &'a LeapScript) -> Self {
        Self { backend, template }
    }
}

impl<B: LeapBackend + ?Sized> SolvationOracle for LeapOracle<'_, B> {
    fn solvate(&mut self, point: CalibrationPoint) -> Result<usize, OracleError> {
        let script = self.template.clone().solvate(point);
        let log = self.backend.build(&script)?;
        log.added_residues().ok_or_else(|| OracleError::MissingCount {
            path: log.source.to_string_lossy().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedBackend {
        logs: Vec<String>,
        seen: Vec<LeapScript>,
        dir: PathBuf,
    }

    impl LeapBackend for ScriptedBackend {
        fn build(&mut self, script: &LeapScript) -> Result<LeapLog, OracleError> {
            self.seen.push(script.clone());
            let text = self.logs.remove(0);
            Ok(LeapLog::new(self.dir.join("leap.log"), text))
        }
    }

    #[test]
    fn closures_act_as_oracles() {
        let mut oracle = |point: CalibrationPoint| -> Result<usize, OracleError> {
            Ok((point.closeness * 100.0).round() as usize)
        };
        let count = oracle
            .solvate(CalibrationPoint {
                distance: 10.0,
                closeness: 0.5,
            })
            .unwrap();
        assert_eq!(count, 50);
    }

    #[test]
    fn leap_oracle_solvates_template_and_reads_count() {
        let mut backend = ScriptedBackend {
            logs: vec!["Added 1498 residues.\n".to_string()],
            seen: Vec::new(),
            dir: PathBuf::from("work"),
        };
        let template = LeapScript::new("rec.pdb");
        let point = CalibrationPoint {
            distance: 10.0,
            closeness: 1.0,
        };
        let count = LeapOracle::new(&mut backend, &template)
            .solvate(point)
            .unwrap();
        assert_eq!(count, 1498);
        assert_eq!(backend.seen[0].solvation(), Some(point));
        assert_eq!(template.solvation(), None);
    }

    #[test]
    fn leap_oracle_reports_missing_count() {
        let mut backend = ScriptedBackend {
            logs: vec!["Could not open file rec.pdb\n".to_string()],
            seen: Vec::new(),
            dir: PathBuf::from("work"),
        };
        let template = LeapScript::new("rec.pdb");
        let err = LeapOracle::new(&mut backend, &template)
            .solvate(CalibrationPoint {
                distance: 10.0,
                closeness: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, OracleError::MissingCount { path } if path.ends_with("leap.log")));
    }

    #[test]
    fn runner_reports_unlaunchable_executable() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner =
            TleapRunner::new(dir.path()).with_executable(dir.path().join("no-such-leap"));
        let err = runner.build(&LeapScript::new("rec.pdb")).unwrap_err();
        assert!(matches!(err, OracleError::Invocation { .. }));
        let script = std::fs::read_to_string(dir.path().join("leap.in")).unwrap();
        assert!(script.contains("complex = loadPdb rec.pdb"));
    }

    #[test]
    fn runner_reports_missing_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TleapRunner::new(dir.path().join("absent"));
        let err = runner.build(&LeapScript::new("rec.pdb")).unwrap_err();
        assert!(matches!(err, OracleError::Io { .. }));
    }

    #[test]
    fn stderr_tail_keeps_last_non_empty_lines() {
        let stderr = "one\n\ntwo\nthree\nfour\nfive\n  six  \n\n";
        assert_eq!(stderr_tail(stderr), "two / three / four / five / six");
        assert_eq!(stderr_tail(""), "");
    }

    #[cfg(unix)]
    #[test]
    fn runner_failure_carries_build_tool_diagnostics() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("failing-leap");
        std::fs::write(
            &tool,
            "#!/bin/sh\necho 'Added 10 residues.'\necho 'FATAL: Unknown residue XYZ' >&2\nexit 3\n",
        )
        .unwrap();
        let mut permissions = std::fs::metadata(&tool).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&tool, permissions).unwrap();

        let mut runner = TleapRunner::new(dir.path()).with_executable(&tool);
        let err = runner.build(&LeapScript::new("rec.pdb")).unwrap_err();
        match err {
            OracleError::Invocation { reason, .. } => {
                assert!(reason.contains("FATAL: Unknown residue XYZ"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let log = std::fs::read_to_string(dir.path().join("leap.log")).unwrap();
        assert_eq!(log, "Added 10 residues.\n");
    }
}
