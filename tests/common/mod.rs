#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a source catalog JSON with a single named source.
    pub fn write_catalog(
        &self,
        source: &str,
        extract: &Path,
        codes: &Path,
        columns: &[&str],
    ) -> PathBuf {
        let columns_json = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let json = format!(
            r#"{{
  "{source}": {{
    "file": "{file}",
    "codes": "{codes}",
    "columns": [{columns_json}]
  }}
}}"#,
            file = extract.display(),
            codes = codes.display(),
        );
        self.write("data_sources.json", &json)
    }
}

/// Standard-layout extract used across suites: two territories, two coverage
/// classes, three years.
pub const STANDARD_EXTRACT: &str = "\
system_index,area,coverage_code,territory_code,year,geometry_ref
0_5,12.5,3,5.0,2020,
0_5,7.5,15,5.0,2020,
0_5,11.0,3,5.0,2021,
0_6,30.0,3,6.0,2020,
0_6,2.0,15,6.0,2022,
";

/// Municipio code table with composite Departamento-Municipio names.
pub const MUNICIPIO_CODES: &str = "\
5.0;Meta-Villavicencio
6.0;Amazonas-Leticia
";
