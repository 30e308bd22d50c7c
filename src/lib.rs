pub mod adapter;
pub mod cache;
pub mod cli;
pub mod codes;
pub mod config;
pub mod dataset;
pub mod io_utils;
pub mod names;
pub mod query;
pub mod search;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, CodesArgs, Commands, HarmonizeArgs, QueryArgs, SearchArgs, SourcesArgs},
    codes::{CodeKey, CodeTable},
    config::SourceCatalog,
    query::{FilteredView, GroupDim, QueryParams},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("amazonia_harmonize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sources(args) => handle_sources(&args),
        Commands::Codes(args) => handle_codes(&args),
        Commands::Harmonize(args) => handle_harmonize(&args),
        Commands::Query(args) => handle_query(&args),
        Commands::Search(args) => handle_search(&args),
    }
}

fn handle_sources(args: &SourcesArgs) -> Result<()> {
    let catalog = SourceCatalog::load(&args.catalog)?;
    let headers = ["source", "layout", "extract", "codes", "levels"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = catalog
        .iter()
        .map(|(name, config)| {
            vec![
                name.to_string(),
                adapter::detect(config).to_string(),
                config.file.display().to_string(),
                config.codes.display().to_string(),
                config.levels().join(", "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    for failure in catalog.failures() {
        warn!("Source '{}' skipped: {}", failure.name, failure.reason);
    }
    info!(
        "{} usable source(s), {} misconfigured",
        catalog.len(),
        catalog.failures().len()
    );
    Ok(())
}

fn handle_codes(args: &CodesArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let codes = CodeTable::load(&args.input, encoding)
        .with_context(|| format!("Loading code table {:?}", args.input))?;
    let mut entries = codes
        .iter()
        .map(|(key, name)| (key.clone(), name.to_string()))
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| {
        let (rank_a, num_a) = code_sort_key(&a.0);
        let (rank_b, num_b) = code_sort_key(&b.0);
        rank_a
            .cmp(&rank_b)
            .then_with(|| num_a.total_cmp(&num_b))
            .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
    });

    let term = args.term.as_deref().unwrap_or("");
    let names = entries.iter().map(|(_, name)| name.clone()).collect::<Vec<_>>();
    let matching = search::search(term, &names);
    let rows = entries
        .iter()
        .filter(|(_, name)| matching.iter().any(|m| *m == name))
        .map(|(key, name)| vec![key.to_string(), name.clone()])
        .collect::<Vec<_>>();
    let headers = vec!["code".to_string(), "name".to_string()];
    table::print_table(&headers, &rows);
    info!("Showing {} of {} entries", rows.len(), codes.len());
    Ok(())
}

fn code_sort_key(key: &CodeKey) -> (u8, f64) {
    match key {
        CodeKey::Numeric(value) => (0, *value),
        CodeKey::Text(_) => (1, 0.0),
    }
}

fn handle_harmonize(args: &HarmonizeArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let catalog = SourceCatalog::load(&args.catalog)?;
    let config = catalog.get(&args.source)?;
    if args.refresh {
        cache::clear();
    }
    let dataset = cache::fetch_or_build(&args.source, config, args.delimiter, encoding)?;
    let input_delimiter = io_utils::resolve_input_delimiter(&config.file, args.delimiter);
    let output_delimiter = args.output_delimiter.unwrap_or(input_delimiter);
    info!(
        "Harmonizing '{}' -> {} (delimiter '{}')",
        args.source,
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        printable_delimiter(output_delimiter)
    );
    let written = dataset.write_canonical(
        dataset.rows.iter(),
        args.output.as_deref(),
        output_delimiter,
    )?;
    info!(
        "Wrote {written} canonical row(s) for '{}' ({} dropped during normalization)",
        args.source, dataset.dropped
    );
    Ok(())
}

fn handle_query(args: &QueryArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let catalog = SourceCatalog::load(&args.catalog)?;
    let config = catalog.get(&args.source)?;
    if args.refresh {
        cache::clear();
    }
    let dataset = cache::fetch_or_build(&args.source, config, args.delimiter, encoding)?;

    let levels = args
        .levels
        .iter()
        .map(|raw| cli::parse_level_selection(raw).map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;
    let params = QueryParams {
        year_min: args.year_min,
        year_max: args.year_max,
        coverages: args.coverages.clone(),
        territories: args.territories.clone(),
        levels,
    };
    let view = query::filter(&dataset, &params)?;
    info!(
        "{} of {} row(s) match the predicate set, total area {}",
        view.len(),
        dataset.rows.len(),
        format_area(view.total_area())
    );

    let input_delimiter = io_utils::resolve_input_delimiter(&config.file, args.delimiter);
    let output_delimiter = args.output_delimiter.unwrap_or(input_delimiter);
    if args.group_by.is_empty() {
        let written = dataset.write_canonical(
            view.rows.iter().copied(),
            args.output.as_deref(),
            output_delimiter,
        )?;
        info!("Exported {written} filtered row(s)");
        return Ok(());
    }

    let dims = args
        .group_by
        .iter()
        .map(|name| GroupDim::parse(name, &dataset))
        .collect::<Result<Vec<_>>>()?;
    let top = args.top.unwrap_or_else(|| default_top(&dims));
    let aggregates = view.top_n(&dims, top);
    emit_aggregates(&view, &dims, &aggregates, args, output_delimiter)?;
    Ok(())
}

/// Ranking cutoff applied when the caller does not pass `--top`. The single
/// coverage and territory rankings keep their chart cutoffs; everything else
/// is unbounded.
fn default_top(dims: &[GroupDim]) -> usize {
    match dims {
        [GroupDim::Coverage] => query::TOP_COVERAGES,
        [GroupDim::Territory] => query::TOP_TERRITORIES,
        _ => 0,
    }
}

fn emit_aggregates(
    view: &FilteredView<'_>,
    dims: &[GroupDim],
    aggregates: &[query::AggregateRow],
    args: &QueryArgs,
    output_delimiter: u8,
) -> Result<()> {
    let mut headers = dims
        .iter()
        .map(|dim| dim.label(view.dataset()))
        .collect::<Vec<_>>();
    headers.extend(["sum_area", "mean_area", "count"].map(String::from));
    let rows = aggregates
        .iter()
        .map(|row| {
            let mut cells = row.keys.clone();
            cells.push(format_area(row.sum));
            cells.push(format_area(row.mean));
            cells.push(row.count.to_string());
            cells
        })
        .collect::<Vec<_>>();
    if args.table {
        table::print_table(&headers, &rows);
    } else {
        let mut writer = io_utils::open_csv_writer(args.output.as_deref(), output_delimiter)?;
        writer.write_record(&headers).context("Writing aggregate header")?;
        for row in &rows {
            writer.write_record(row).context("Writing aggregate row")?;
        }
        writer.flush().context("Flushing aggregate output")?;
    }
    Ok(())
}

fn handle_search(args: &SearchArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let catalog = SourceCatalog::load(&args.catalog)?;
    let config = catalog.get(&args.source)?;
    let dataset = cache::fetch_or_build(&args.source, config, args.delimiter, encoding)?;
    let view = query::filter(&dataset, &QueryParams::default())?;

    let dimension = args.dimension.trim().to_lowercase();
    let candidates: Vec<String> = match dimension.as_str() {
        "territory" => view
            .distinct_territories()
            .iter()
            .map(|territory| dataset.territory_display(territory))
            .collect(),
        "coverage" => view
            .distinct_coverages()
            .iter()
            .map(|code| dataset.coverage_display(*code))
            .collect(),
        _ => view.distinct_level_values(&dimension)?,
    };
    let matches = search::search(&args.term, &candidates);
    let summary = search::summarize(&matches);
    print!("{summary}");
    info!(
        "{} match(es) for '{}' in dimension '{}'",
        matches.len(),
        args.term,
        dimension
    );
    Ok(())
}

fn format_area(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
