//! Schema detection and format adaptation.
//!
//! Extracts arrive in three incompatible column layouts, depending on which
//! export pipeline produced them:
//!
//! - **Standard**: `system_index, area, coverage, territory, year, geometry`,
//!   territory as a numeric code.
//! - **Hierarchical-Columns**: same layout, but the territory code resolves to
//!   a hyphen-joined composite name that is split into one derived field per
//!   declared hierarchy level.
//! - **Categorical-Mask**: `territory, name, class, year, area`, where the
//!   territory dimension is a small closed set of protected-area category
//!   labels (`ANP`, `TIS`, `Translape`) rather than codes.
//!
//! Detection is a pure classification of the source configuration; it never
//! reads file contents. Adaptation renames columns positionally, coerces
//! numerics, and silently drops rows that fail coercion while counting them
//! for the caller.

use std::{fmt, sync::OnceLock};

use log::debug;
use regex::Regex;

use crate::{
    codes::{CodeKey, CodeTable},
    config::SourceConfig,
    dataset::{CanonicalRecord, Territory},
    names,
};

/// Closed set of known column-layout variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Standard,
    Hierarchical,
    CategoricalMask,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdapterKind::Standard => "standard",
            AdapterKind::Hierarchical => "hierarchical-columns",
            AdapterKind::CategoricalMask => "categorical-mask",
        };
        f.write_str(label)
    }
}

/// Filename pattern of the protected-area mask exports, e.g.
/// `AREAS-INTEGRACION-AMAZONIA-MASCARA-DASH_clases.csv`.
fn mask_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)mascara").expect("valid mask pattern"))
}

/// Selects the adapter for a source configuration. When no rule matches, the
/// Standard layout is assumed; that fallback is deliberate and logged rather
/// than raised.
pub fn detect(config: &SourceConfig) -> AdapterKind {
    let file_name = config
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    if mask_pattern().is_match(file_name) {
        return AdapterKind::CategoricalMask;
    }
    if !config.levels().is_empty() {
        return AdapterKind::Hierarchical;
    }
    debug!(
        "No adapter rule matched '{file_name}'; assuming the standard column layout"
    );
    AdapterKind::Standard
}

/// Result of adapting a raw extract: the canonical rows plus the number of
/// rows dropped during coercion.
#[derive(Debug, Default)]
pub struct Normalized {
    pub rows: Vec<CanonicalRecord>,
    pub dropped: usize,
}

/// Rewrites raw rows into canonical records. `level_keys` are the
/// lower-cased declared hierarchy level names; they only apply to the
/// hierarchical variant.
pub fn normalize(
    kind: AdapterKind,
    raw_rows: &[Vec<String>],
    territory_names: &CodeTable,
    level_keys: &[String],
) -> Normalized {
    let mut normalized = Normalized::default();
    for row in raw_rows {
        let record = match kind {
            AdapterKind::Standard => adapt_positional(row, territory_names, &[]),
            AdapterKind::Hierarchical => adapt_positional(row, territory_names, level_keys),
            AdapterKind::CategoricalMask => adapt_mask(row),
        };
        match record {
            Some(record) => normalized.rows.push(record),
            None => normalized.dropped += 1,
        }
    }
    normalized
}

// Positional indices of the standard layout.
const COL_SYSTEM_INDEX: usize = 0;
const COL_AREA: usize = 1;
const COL_COVERAGE: usize = 2;
const COL_TERRITORY: usize = 3;
const COL_YEAR: usize = 4;
const COL_GEOMETRY: usize = 5;

// Positional indices of the mask layout.
const MASK_COL_TERRITORY: usize = 0;
const MASK_COL_NAME: usize = 1;
const MASK_COL_CLASS: usize = 2;
const MASK_COL_YEAR: usize = 3;
const MASK_COL_AREA: usize = 4;

fn adapt_positional(
    row: &[String],
    territory_names: &CodeTable,
    level_keys: &[String],
) -> Option<CanonicalRecord> {
    let area = parse_area(field(row, COL_AREA)?)?;
    let coverage = parse_finite(field(row, COL_COVERAGE)?)?;
    let year = parse_year(field(row, COL_YEAR)?)?;
    let territory_code = parse_finite(field(row, COL_TERRITORY)?)?;

    let levels = if level_keys.is_empty() {
        Vec::new()
    } else {
        let resolved = territory_names.resolve(&CodeKey::from_numeric(territory_code));
        names::decompose(&resolved, level_keys.len())
    };

    Some(CanonicalRecord {
        system_index: field(row, COL_SYSTEM_INDEX).unwrap_or_default().to_string(),
        area,
        coverage,
        territory: Territory::Code(territory_code),
        year,
        geometry: field(row, COL_GEOMETRY).unwrap_or_default().to_string(),
        levels,
    })
}

fn adapt_mask(row: &[String]) -> Option<CanonicalRecord> {
    let area = parse_area(field(row, MASK_COL_AREA)?)?;
    let coverage = parse_finite(field(row, MASK_COL_CLASS)?)?;
    let year = parse_year(field(row, MASK_COL_YEAR)?)?;
    let label = field(row, MASK_COL_NAME)?;

    Some(CanonicalRecord {
        system_index: field(row, MASK_COL_TERRITORY).unwrap_or_default().to_string(),
        area,
        coverage,
        territory: Territory::Label(canonical_mask_label(label)),
        year,
        geometry: String::new(),
        levels: Vec::new(),
    })
}

/// Canonicalizes the mask category spellings that drifted across exports.
/// Any other label passes through unchanged.
pub fn canonical_mask_label(label: &str) -> String {
    match label {
        "tis" => "TIS".to_string(),
        "translape" => "Translape".to_string(),
        other => other.to_string(),
    }
}

fn field(row: &[String], idx: usize) -> Option<&str> {
    let value = row.get(idx)?.trim();
    if value.is_empty() { None } else { Some(value) }
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_area(value: &str) -> Option<f64> {
    parse_finite(value).filter(|v| *v >= 0.0)
}

fn parse_year(value: &str) -> Option<i32> {
    let numeric = parse_finite(value)?;
    if numeric.fract() != 0.0 {
        return None;
    }
    Some(numeric as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(file: &str, columns: &[&str]) -> SourceConfig {
        SourceConfig {
            file: PathBuf::from(file),
            codes: PathBuf::from("codes.txt"),
            coverage_codes: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn raw(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn detect_prefers_the_mask_pattern_over_declared_levels() {
        let masked = config("AREAS-INTEGRACION-AMAZONIA-MASCARA-DASH_clases.csv", &["A"]);
        assert_eq!(detect(&masked), AdapterKind::CategoricalMask);
    }

    #[test]
    fn detect_selects_hierarchical_when_levels_are_declared() {
        let cfg = config("municipio.csv", &["Departamento", "Municipio"]);
        assert_eq!(detect(&cfg), AdapterKind::Hierarchical);
    }

    #[test]
    fn detect_falls_back_to_standard() {
        let cfg = config("resguardos.csv", &[]);
        assert_eq!(detect(&cfg), AdapterKind::Standard);
    }

    #[test]
    fn standard_adapter_coerces_and_drops() {
        let rows = vec![
            raw(&["0_5", "12.5", "3", "5.0", "2020", ""]),
            raw(&["0_6", "not-a-number", "3", "6.0", "2020", ""]),
            raw(&["0_7", "4.0", "3", "no-code", "2020", ""]),
            raw(&["0_8", "-1.0", "3", "8.0", "2020", ""]),
            raw(&["0_9", "4.0", "3", "9.0", "2020.5", ""]),
        ];
        let result = normalize(AdapterKind::Standard, &rows, &CodeTable::default(), &[]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.dropped, 4);
        let record = &result.rows[0];
        assert_eq!(record.system_index, "0_5");
        assert_eq!(record.area, 12.5);
        assert_eq!(record.coverage, 3.0);
        assert_eq!(record.territory, Territory::Code(5.0));
        assert_eq!(record.year, 2020);
        assert!(record.levels.is_empty());
    }

    #[test]
    fn short_rows_lose_only_the_optional_trailing_fields() {
        // Five columns: geometry is absent, which is fine; the essential
        // fields are all present.
        let rows = vec![raw(&["0_5", "12.5", "3", "5.0", "2020"])];
        let result = normalize(AdapterKind::Standard, &rows, &CodeTable::default(), &[]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].geometry, "");
    }

    #[test]
    fn hierarchical_adapter_derives_level_fields() {
        let codes = code_table(&[("5.0", "Meta-Villavicencio"), ("6.0", "Amazonas")]);
        let levels = vec!["departamento".to_string(), "municipio".to_string()];
        let rows = vec![
            raw(&["0_5", "12.5", "3", "5.0", "2020", ""]),
            raw(&["0_6", "2.0", "3", "6.0", "2020", ""]),
            raw(&["0_7", "2.0", "3", "7.0", "2020", ""]),
        ];
        let result = normalize(AdapterKind::Hierarchical, &rows, &codes, &levels);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(
            result.rows[0].levels,
            vec![Some("Meta".to_string()), Some("Villavicencio".to_string())]
        );
        // Name with fewer segments than declared levels: padded, not dropped.
        assert_eq!(
            result.rows[1].levels,
            vec![Some("Amazonas".to_string()), None]
        );
        // Unresolved code falls back to the stringified code as level one.
        assert_eq!(result.rows[2].levels, vec![Some("7".to_string()), None]);
    }

    #[test]
    fn mask_adapter_keeps_labels_textual_and_canonicalizes_synonyms() {
        let rows = vec![
            raw(&["1", "ANP", "3", "2020", "10.0"]),
            raw(&["2", "tis", "3", "2020", "20.0"]),
            raw(&["3", "translape", "3", "2020", "30.0"]),
            raw(&["4", "", "3", "2020", "40.0"]),
        ];
        let result = normalize(AdapterKind::CategoricalMask, &rows, &CodeTable::default(), &[]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.dropped, 1);
        assert_eq!(result.rows[0].territory, Territory::Label("ANP".to_string()));
        assert_eq!(result.rows[1].territory, Territory::Label("TIS".to_string()));
        assert_eq!(
            result.rows[2].territory,
            Territory::Label("Translape".to_string())
        );
        assert_eq!(result.rows[1].system_index, "2");
    }

    #[test]
    fn readapting_canonical_output_is_idempotent() {
        let rows = vec![raw(&["0_5", "12.5", "3", "5.0", "2020", ""])];
        let first = normalize(AdapterKind::Standard, &rows, &CodeTable::default(), &[]);
        let reexported = first
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.system_index.clone(),
                    r.area.to_string(),
                    r.coverage.to_string(),
                    r.territory.to_string(),
                    r.year.to_string(),
                    r.geometry.clone(),
                ]
            })
            .collect::<Vec<_>>();
        let second = normalize(AdapterKind::Standard, &reexported, &CodeTable::default(), &[]);
        assert_eq!(second.dropped, 0);
        assert_eq!(second.rows, first.rows);
    }

    fn code_table(entries: &[(&str, &str)]) -> CodeTable {
        let workspace = tempfile::tempdir().expect("temp dir");
        let path = workspace.path().join("codes.txt");
        let contents = entries
            .iter()
            .map(|(code, name)| format!("{code};{name}"))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, contents).expect("write codes");
        CodeTable::load(&path, encoding_rs::UTF_8).expect("load codes")
    }
}
