//! Source catalog: the JSON configuration naming each raw extract, its code
//! table, and the optional ordered list of territory hierarchy levels.
//!
//! ```json
//! {
//!   "Municipios": {
//!     "file": "AREAS-INTEGRACION-AMAZONIA-MUNICIPIO-DASH.csv",
//!     "codes": "municipios.txt",
//!     "columns": ["Departamento", "Municipio"]
//!   }
//! }
//! ```
//!
//! A malformed entry invalidates only that source; the rest of the catalog
//! stays usable.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct SourceConfig {
    /// Raw extract path.
    pub file: PathBuf,
    /// Code table path for the territory dimension.
    pub codes: PathBuf,
    /// Optional code table for coverage class names; coverage codes display
    /// as themselves when absent.
    #[serde(default)]
    pub coverage_codes: Option<PathBuf>,
    /// Ordered hierarchy level names; absent or empty means a single flat
    /// territory dimension.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl SourceConfig {
    pub fn levels(&self) -> &[String] {
        &self.columns
    }

    /// Declared level names, lower-cased, as used for derived field naming
    /// and query dimensions.
    pub fn level_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect()
    }
}

/// One catalog entry that failed to parse, kept for reporting.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: BTreeMap<String, SourceConfig>,
    failures: Vec<SourceFailure>,
}

impl SourceCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening source catalog {path:?}"))?;
        let reader = BufReader::new(file);
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_reader(reader).context("Parsing source catalog JSON")?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: BTreeMap<String, serde_json::Value>) -> Self {
        let mut sources = BTreeMap::new();
        let mut failures = Vec::new();
        for (name, value) in raw {
            match serde_json::from_value::<SourceConfig>(value) {
                Ok(config) => {
                    sources.insert(name, config);
                }
                Err(err) => {
                    warn!("Source '{name}' is misconfigured and will be skipped: {err}");
                    failures.push(SourceFailure {
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        SourceCatalog { sources, failures }
    }

    pub fn get(&self, name: &str) -> Result<&SourceConfig> {
        self.sources.get(name).ok_or_else(|| {
            if let Some(failure) = self.failures.iter().find(|f| f.name == name) {
                anyhow!("Source '{name}' is misconfigured: {}", failure.reason)
            } else {
                anyhow!(
                    "Source '{name}' not found; available: {}",
                    self.sources.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceConfig)> {
        self.sources
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
