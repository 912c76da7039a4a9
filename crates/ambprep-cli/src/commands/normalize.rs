use super::{read_structure, write_structure};
use crate::cli::NormalizeArgs;
use crate::error::{CliError, Result};
use ambprep::core::library::registry::ReferenceLibrary;
use ambprep::engine::config::NormalizeConfig;
use ambprep::engine::tasks::normalize;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug)]
struct FileSummary {
    output: PathBuf,
    removed: usize,
    unknown_residues: usize,
}

pub fn run(args: NormalizeArgs) -> Result<()> {
    let mut seen = HashSet::new();
    for input in &args.inputs {
        let name = input.file_name().ok_or_else(|| {
            CliError::Argument(format!("Input path has no file name: {}", input.display()))
        })?;
        if !seen.insert(name) {
            return Err(CliError::Argument(format!(
                "Several inputs share the file name '{}'; outputs would overwrite each other.",
                name.to_string_lossy()
            )));
        }
    }

    info!("Loading reference library from {:?}", &args.library);
    let library = ReferenceLibrary::load(&args.library)?;
    info!(residues = library.len(), "Reference library loaded.");
    std::fs::create_dir_all(&args.output_dir)?;

    let config = NormalizeConfig {
        keep_hydrogens: args.keep_hydrogens,
        rename_atoms: args.rename_atoms,
    };

    let outcomes: Vec<Result<FileSummary>> = args
        .inputs
        .par_iter()
        .map(|input| normalize_file(input, &args.output_dir, &library, &config))
        .collect();

    let mut failures = 0usize;
    for (input, outcome) in args.inputs.iter().zip(&outcomes) {
        match outcome {
            Ok(summary) => println!(
                "✓ {} -> {} ({} atom(s) removed, {} unknown residue type(s))",
                input.display(),
                summary.output.display(),
                summary.removed,
                summary.unknown_residues
            ),
            Err(e) => {
                failures += 1;
                error!("Failed to normalize {:?}: {}", input, e);
                eprintln!("✗ {}: {}", input.display(), e);
            }
        }
    }

    if failures > 0 {
        return Err(CliError::Other(anyhow::anyhow!(
            "{} of {} structure(s) could not be normalized",
            failures,
            args.inputs.len()
        )));
    }
    Ok(())
}

fn normalize_file(
    input: &Path,
    output_dir: &Path,
    library: &ReferenceLibrary,
    config: &NormalizeConfig,
) -> Result<FileSummary> {
    let structure = read_structure(input)?;
    let report = normalize::run(&structure, library, config);
    for warning in &report.warnings {
        warn!("{}: {}", input.display(), warning);
    }

    let file_name = input.file_name().ok_or_else(|| {
        CliError::Argument(format!("Input path has no file name: {}", input.display()))
    })?;
    let output = output_dir.join(file_name);
    write_structure(&report.structure, &output)?;

    Ok(FileSummary {
        output,
        removed: report.removed_count(),
        unknown_residues: report.warnings.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{DIPEPTIDE, LIBRARY, write};

    fn args(inputs: Vec<PathBuf>, library: PathBuf, output_dir: PathBuf) -> NormalizeArgs {
        NormalizeArgs {
            inputs,
            library,
            output_dir,
            keep_hydrogens: false,
            rename_atoms: false,
        }
    }

    #[test]
    fn normalizes_every_input_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let library = write(dir.path(), "lib.dat", LIBRARY);
        let first = write(dir.path(), "first.pdb", DIPEPTIDE);
        let second = write(dir.path(), "second.pdb", DIPEPTIDE);
        let out = dir.path().join("out");

        run(args(vec![first, second], library, out.clone())).unwrap();

        for name in ["first.pdb", "second.pdb"] {
            let text = std::fs::read_to_string(out.join(name)).unwrap();
            assert!(text.starts_with("REMARK"));
            assert!(!text.contains(" HA "));
            assert!(text.contains(" CB "));
            assert!(text.contains("TER"));
        }
    }

    #[test]
    fn unreadable_inputs_fail_the_command_but_not_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let library = write(dir.path(), "lib.dat", LIBRARY);
        let good = write(dir.path(), "good.pdb", DIPEPTIDE);
        let missing = dir.path().join("missing.pdb");
        let out = dir.path().join("out");

        let result = run(args(vec![good, missing], library, out.clone()));

        assert!(matches!(result, Err(CliError::Other(_))));
        assert!(out.join("good.pdb").exists());
    }

    #[test]
    fn duplicate_file_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let library = write(dir.path(), "lib.dat", LIBRARY);
        let inputs = vec![dir.path().join("a/x.pdb"), dir.path().join("b/x.pdb")];

        let result = run(args(inputs, library, dir.path().join("out")));
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn missing_library_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.pdb", DIPEPTIDE);
        let result = run(args(
            vec![input],
            dir.path().join("absent.dat"),
            dir.path().join("out"),
        ));
        assert!(matches!(result, Err(CliError::Library(_))));
    }
}
