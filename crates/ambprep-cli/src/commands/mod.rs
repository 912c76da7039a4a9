pub mod calibrate;
pub mod mask;
pub mod normalize;
pub mod prepare;

use crate::error::{CliError, Result};
use ambprep::core::io::pdb::PdbFile;
use ambprep::core::io::traits::StructureFile;
use ambprep::core::models::structure::Structure;
use ambprep::engine::error::EngineError;
use std::path::Path;

pub(crate) fn read_structure(path: &Path) -> Result<Structure> {
    PdbFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

pub(crate) fn write_structure(structure: &Structure, path: &Path) -> Result<()> {
    PdbFile::write_to_path(structure, path).map_err(|source| {
        CliError::Engine(EngineError::Structure {
            path: path.to_string_lossy().to_string(),
            source,
        })
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    pub const LIBRARY: &str = "\
RESIDUE PROTON TABLE
ALA 3
N CA C O CB
1 2 3 4        HA
2 5 6 7 8      HB1 HB2 HB3
GLY 1
N CA C O
1 2 3 4        HA2 HA3
";

    pub const DIPEPTIDE: &str = "\
REMARK   1 ALA-GLY
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  H   ALA A   1       0.500   0.000   0.000  1.00  0.00           H
ATOM      3  CA  ALA A   1       1.458   0.000   0.000  1.00  0.00           C
ATOM      4  HA  ALA A   1       1.800   1.000   0.000  1.00  0.00           H
ATOM      5  CB  ALA A   1       1.900  -1.400   0.000  1.00  0.00           C
ATOM      6  C   ALA A   1       2.009   1.420   0.000  1.00  0.00           C
ATOM      7  O   ALA A   1       1.251   2.390   0.000  1.00  0.00           O
ATOM      8  N   GLY A   2       3.332   1.536   0.000  1.00  0.00           N
ATOM      9  CA  GLY A   2       3.970   2.840   0.000  1.00  0.00           C
ATOM     10  C   GLY A   2       5.480   2.700   0.000  1.00  0.00           C
ATOM     11  O   GLY A   2       6.040   1.600   0.000  1.00  0.00           O
END
";

    pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
