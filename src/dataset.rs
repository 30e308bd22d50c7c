//! The canonical dataset: normalized rows plus their attached code tables.
//!
//! A dataset is built once per source configuration and is immutable
//! afterwards; all filtering produces borrowed views over `rows`, never
//! mutations. The canonical CSV shape written by [`Dataset::write_canonical`]
//! re-adapts losslessly through the Standard adapter.

use std::{collections::HashSet, fmt, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    adapter::{self, AdapterKind},
    codes::{CodeKey, CodeTable},
    config::SourceConfig,
    io_utils, names,
};

/// Canonical CSV header for the six shared fields. Derived hierarchy level
/// columns follow, one per declared level.
pub const CANONICAL_HEADERS: [&str; 6] = [
    "system_index",
    "area",
    "coverage_code",
    "territory_code",
    "year",
    "geometry_ref",
];

/// Territory identity. Numeric codes for the standard and hierarchical
/// variants, category labels for the protected-area mask variant. A dataset
/// never mixes the two.
#[derive(Debug, Clone, PartialEq)]
pub enum Territory {
    Code(f64),
    Label(String),
}

impl Territory {
    pub fn code_key(&self) -> CodeKey {
        match self {
            Territory::Code(code) => CodeKey::from_numeric(*code),
            Territory::Label(label) => CodeKey::Text(label.clone()),
        }
    }

    /// True when `selection` names this territory, either as its code
    /// (integer or float spelling) or as its exact label.
    pub fn matches(&self, selection: &str) -> bool {
        match self {
            Territory::Code(code) => selection
                .trim()
                .parse::<f64>()
                .is_ok_and(|parsed| parsed == *code),
            Territory::Label(label) => label == selection.trim(),
        }
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Territory::Code(code) => write!(f, "{}", CodeKey::from_numeric(*code)),
            Territory::Label(label) => f.write_str(label),
        }
    }
}

/// One normalized row: territory × coverage class × year.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Opaque provenance string from the export pipeline; pass-through only.
    pub system_index: String,
    /// Square kilometers, non-negative.
    pub area: f64,
    /// Land-cover class code, integer-valued.
    pub coverage: f64,
    pub territory: Territory,
    pub year: i32,
    /// Unused placeholder retained for downstream format compatibility.
    pub geometry: String,
    /// Derived hierarchy values, positionally parallel to the dataset's
    /// declared level names. Trailing levels may be unresolved.
    pub levels: Vec<Option<String>>,
}

impl CanonicalRecord {
    pub fn to_canonical_row(&self, level_count: usize) -> Vec<String> {
        let mut row = vec![
            self.system_index.clone(),
            self.area.to_string(),
            self.coverage.to_string(),
            self.territory.to_string(),
            self.year.to_string(),
            self.geometry.clone(),
        ];
        for idx in 0..level_count {
            row.push(
                self.levels
                    .get(idx)
                    .and_then(|level| level.clone())
                    .unwrap_or_default(),
            );
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: String,
    pub adapter: AdapterKind,
    pub rows: Vec<CanonicalRecord>,
    pub territory_names: CodeTable,
    /// Coverage class names; empty when the source declares no coverage
    /// code table, in which case codes display as themselves.
    pub coverage_names: CodeTable,
    /// Declared hierarchy level names, as configured (display case).
    pub level_names: Vec<String>,
    /// Lower-cased level names used as derived field/dimension keys.
    pub level_keys: Vec<String>,
    /// Rows dropped during normalization, surfaced for transparency.
    pub dropped: usize,
}

impl Dataset {
    /// Loads a raw extract and harmonizes it into a canonical dataset.
    ///
    /// The code table degrades to an empty mapping on failure; per-row
    /// coercion failures only increment `dropped`. Whole-file I/O errors on
    /// the extract itself are returned.
    pub fn build(
        source: &str,
        config: &SourceConfig,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let kind = adapter::detect(config);
        info!(
            "Harmonizing source '{source}' from {:?} ({kind} layout)",
            config.file
        );
        let territory_names = CodeTable::load_or_empty(&config.codes, encoding);
        let coverage_names = match &config.coverage_codes {
            Some(path) => CodeTable::load_or_empty(path, encoding),
            None => CodeTable::default(),
        };
        let delimiter = io_utils::resolve_input_delimiter(&config.file, delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(&config.file, delimiter, true)?;
        let mut raw_rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
            raw_rows.push(io_utils::decode_record(&record, encoding)?);
        }

        let level_keys = config.level_keys();
        let normalized = adapter::normalize(kind, &raw_rows, &territory_names, &level_keys);
        if normalized.dropped > 0 {
            warn!(
                "Dropped {} of {} row(s) from '{source}' during normalization",
                normalized.dropped,
                raw_rows.len()
            );
        }
        let dataset = Dataset {
            source: source.to_string(),
            adapter: kind,
            rows: normalized.rows,
            territory_names,
            coverage_names,
            level_names: config.levels().to_vec(),
            level_keys,
            dropped: normalized.dropped,
        };
        dataset.log_unresolved_territories();
        info!(
            "Source '{source}': {} canonical row(s), {} territory name(s)",
            dataset.rows.len(),
            dataset.territory_names.len()
        );
        Ok(dataset)
    }

    fn log_unresolved_territories(&self) {
        if self.territory_names.is_empty() {
            return;
        }
        let mut unresolved = HashSet::new();
        for record in &self.rows {
            let key = record.territory.code_key();
            if self.territory_names.get(&key).is_none() {
                unresolved.insert(key.to_string());
            }
        }
        if !unresolved.is_empty() {
            let mut codes = unresolved.into_iter().collect::<Vec<_>>();
            codes.sort();
            debug!(
                "{} territory code(s) in '{}' have no code table entry: {}",
                codes.len(),
                self.source,
                codes.join(", ")
            );
        }
    }

    /// Resolved display name for a territory, falling back to the code.
    pub fn territory_name(&self, territory: &Territory) -> String {
        self.territory_names.resolve(&territory.code_key())
    }

    /// `code - name` pair used by selection controls and rankings. Composite
    /// names of hierarchical sources are rendered with their level labels.
    pub fn territory_display(&self, territory: &Territory) -> String {
        match territory {
            Territory::Code(_) => {
                let name = self.territory_name(territory);
                format!(
                    "{territory} - {}",
                    names::labeled_display(&name, &self.level_names)
                )
            }
            Territory::Label(label) => label.clone(),
        }
    }

    /// Resolved display name for a coverage class, falling back to the code.
    pub fn coverage_display(&self, code: f64) -> String {
        self.coverage_names.resolve(&CodeKey::from_numeric(code))
    }

    /// Observed year bounds, `None` for an empty dataset.
    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let min = self.rows.iter().map(|r| r.year).min()?;
        let max = self.rows.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    pub fn canonical_headers(&self) -> Vec<String> {
        let mut headers = CANONICAL_HEADERS
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        headers.extend(self.level_keys.iter().cloned());
        headers
    }

    /// Writes rows back out in the canonical delimited shape. Passing
    /// `self.rows` round-trips the whole dataset losslessly.
    pub fn write_canonical<'a, I>(
        &self,
        rows: I,
        output: Option<&Path>,
        delimiter: u8,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut writer = io_utils::open_csv_writer(output, delimiter)?;
        writer
            .write_record(&self.canonical_headers())
            .context("Writing canonical header")?;
        let mut written = 0usize;
        for record in rows {
            writer
                .write_record(&record.to_canonical_row(self.level_keys.len()))
                .with_context(|| format!("Writing canonical row {}", written + 1))?;
            written += 1;
        }
        writer.flush().context("Flushing canonical output")?;
        Ok(written)
    }
}
