use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Harmonize and query Amazonian land-cover change extracts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the configured data sources and their detected layouts
    Sources(SourcesArgs),
    /// Inspect a territory or coverage code table
    Codes(CodesArgs),
    /// Harmonize a raw extract into the canonical CSV shape
    Harmonize(HarmonizeArgs),
    /// Filter a harmonized dataset and export rows or aggregates
    Query(QueryArgs),
    /// Search resolved display names of a dataset dimension
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Source catalog JSON file
    #[arg(short = 'c', long = "catalog", default_value = "data_sources.json")]
    pub catalog: PathBuf,
}

#[derive(Debug, Args)]
pub struct CodesArgs {
    /// Code table text file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Only show entries whose name contains this term (case-insensitive)
    #[arg(long)]
    pub term: Option<String>,
    /// Character encoding of the table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct HarmonizeArgs {
    /// Source catalog JSON file
    #[arg(short = 'c', long = "catalog", default_value = "data_sources.json")]
    pub catalog: PathBuf,
    /// Source name to harmonize
    #[arg(short = 's', long = "source")]
    pub source: String,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character for reading the extract (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the extract and code table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Rebuild the dataset even if it is cached
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Source catalog JSON file
    #[arg(short = 'c', long = "catalog", default_value = "data_sources.json")]
    pub catalog: PathBuf,
    /// Source name to query
    #[arg(short = 's', long = "source")]
    pub source: String,
    /// Lower bound of the year range (inclusive)
    #[arg(long = "year-min")]
    pub year_min: Option<i32>,
    /// Upper bound of the year range (inclusive)
    #[arg(long = "year-max")]
    pub year_max: Option<i32>,
    /// Coverage class codes to keep (empty selects all)
    #[arg(long = "coverage", value_delimiter = ',')]
    pub coverages: Vec<f64>,
    /// Territory codes or mask labels to keep (empty selects all)
    #[arg(long = "territory", value_delimiter = ',')]
    pub territories: Vec<String>,
    /// Hierarchy level selections such as `departamento=Meta,Amazonas`
    #[arg(long = "level", action = clap::ArgAction::Append)]
    pub levels: Vec<String>,
    /// Group and aggregate by these dimensions instead of exporting rows
    #[arg(long = "group-by", value_delimiter = ',')]
    pub group_by: Vec<String>,
    /// Keep only the top N groups by summed area (defaults to 10 for
    /// coverage rankings, 15 for territory rankings, otherwise all)
    #[arg(long)]
    pub top: Option<usize>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Render aggregates as an elastic table instead of CSV
    #[arg(long)]
    pub table: bool,
    /// CSV delimiter character for reading the extract
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the extract and code table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Rebuild the dataset even if it is cached
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Source catalog JSON file
    #[arg(short = 'c', long = "catalog", default_value = "data_sources.json")]
    pub catalog: PathBuf,
    /// Source name to search within
    #[arg(short = 's', long = "source")]
    pub source: String,
    /// Dimension to search: territory, coverage, or a declared level name
    #[arg(short = 'd', long = "dimension", default_value = "territory")]
    pub dimension: String,
    /// Substring to match (case-insensitive; empty lists everything)
    #[arg(long, default_value = "")]
    pub term: String,
    /// CSV delimiter character for reading the extract
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the extract and code table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Parses one `--level name=value1,value2` selection.
pub fn parse_level_selection(raw: &str) -> Result<(String, Vec<String>), String> {
    let Some((name, values)) = raw.split_once('=') else {
        return Err(format!(
            "Expected `level=value1,value2`, got '{raw}'"
        ));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Missing level name in '{raw}'"));
    }
    let values = values
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect();
    Ok((name.to_string(), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_chars() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn parse_level_selection_splits_name_and_values() {
        let (name, values) = parse_level_selection("departamento=Meta, Amazonas").unwrap();
        assert_eq!(name, "departamento");
        assert_eq!(values, vec!["Meta", "Amazonas"]);

        // An explicit empty selection keeps select-all semantics downstream.
        let (_, empty) = parse_level_selection("municipio=").unwrap();
        assert!(empty.is_empty());

        assert!(parse_level_selection("no-equals").is_err());
    }
}
