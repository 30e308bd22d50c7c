//! Code tables: delimited text files mapping territory or coverage codes to
//! display names.
//!
//! Two historical line formats coexist in the field data:
//!
//! ```text
//! 91.0;Amazonas-Leticia      (current, semicolon)
//! 91.0: Amazonas-Leticia     (legacy, colon)
//! ```
//!
//! Codes are numeric whenever they parse as a finite float; otherwise the raw
//! trimmed string is kept as the key, which is how the protected-area mask
//! categories (`ANP`, `TIS`, ...) are resolved. Duplicate codes overwrite
//! earlier entries; downstream display names depend on that precedence.

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    path::Path,
};

use anyhow::Result;
use encoding_rs::Encoding;
use log::{debug, warn};

use crate::io_utils;

/// Key of a code table entry. Numeric when the code part parses as a finite
/// float, textual otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeKey {
    Numeric(f64),
    Text(String),
}

impl CodeKey {
    /// Parses a raw code. Non-finite parses (`nan`, `inf`) are kept textual
    /// so that every key compares and hashes consistently.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => CodeKey::Numeric(value),
            _ => CodeKey::Text(trimmed.to_string()),
        }
    }

    pub fn from_numeric(value: f64) -> Self {
        CodeKey::Numeric(value)
    }
}

impl Eq for CodeKey {}

impl Hash for CodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            // Normalize -0.0 so it hashes identically to 0.0.
            CodeKey::Numeric(value) => {
                state.write_u8(0);
                state.write_u64((value + 0.0).to_bits());
            }
            CodeKey::Text(text) => {
                state.write_u8(1);
                text.hash(state);
            }
        }
    }
}

impl fmt::Display for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKey::Numeric(value) => {
                if value.fract() == 0.0 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            CodeKey::Text(text) => f.write_str(text),
        }
    }
}

/// In-memory code → display-name mapping. Pure lookup; iteration order is
/// unspecified.
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    entries: HashMap<CodeKey, String>,
}

impl CodeTable {
    /// Loads a code table from disk. Malformed lines are skipped; an I/O or
    /// decoding failure is returned to the caller.
    pub fn load(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let lines = io_utils::read_text_lines(path, encoding)?;
        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for line in &lines {
            match parse_line(line) {
                Some((key, name)) => {
                    entries.insert(key, name);
                }
                None => {
                    if !line.trim().is_empty() {
                        skipped += 1;
                    }
                }
            }
        }
        if skipped > 0 {
            debug!("Skipped {skipped} malformed line(s) in code table {path:?}");
        }
        Ok(CodeTable { entries })
    }

    /// Engine-facing loader: a missing or unreadable table degrades to an
    /// empty mapping with a warning, so harmonization can continue and codes
    /// fall back to displaying themselves.
    pub fn load_or_empty(path: &Path, encoding: &'static Encoding) -> Self {
        match Self::load(path, encoding) {
            Ok(table) => table,
            Err(err) => {
                warn!("Code table {path:?} unavailable ({err:#}); continuing with empty mapping");
                CodeTable::default()
            }
        }
    }

    pub fn get(&self, key: &CodeKey) -> Option<&str> {
        self.entries.get(key).map(|name| name.as_str())
    }

    /// Resolves a code to its display name, falling back to the stringified
    /// code when no entry exists. Never fails.
    pub fn resolve(&self, key: &CodeKey) -> String {
        match self.entries.get(key) {
            Some(name) => name.clone(),
            None => key.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CodeKey, &str)> {
        self.entries.iter().map(|(key, name)| (key, name.as_str()))
    }
}

/// Splits one line into `(code, name)`. Semicolon is checked before the
/// legacy colon; a line is accepted only when splitting yields exactly two
/// non-empty trimmed parts.
fn parse_line(line: &str) -> Option<(CodeKey, String)> {
    let delimiter = if line.contains(';') {
        ';'
    } else if line.contains(':') {
        ':'
    } else {
        return None;
    };
    let parts = line.split(delimiter).collect::<Vec<_>>();
    if parts.len() != 2 {
        return None;
    }
    let code = parts[0].trim();
    let name = parts[1].trim();
    if code.is_empty() || name.is_empty() {
        return None;
    }
    Some((CodeKey::from_raw(code), name.to_string()))
}
