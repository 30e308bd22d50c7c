//! Filter and aggregation engine over a canonical dataset.
//!
//! All predicates are conjunctive. An empty selection set for any dimension
//! means "match all" for that dimension: a user who deselects everything sees
//! the unfiltered dimension, never an empty result. That rule is deliberate
//! and must not be "fixed" into set semantics.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use itertools::Itertools;

use crate::dataset::{CanonicalRecord, Dataset, Territory};

/// Chart cutoff for coverage breakdowns and time series.
pub const TOP_COVERAGES: usize = 10;
/// Chart cutoff for territory rankings.
pub const TOP_TERRITORIES: usize = 15;

/// Predicate set applied to a dataset. Empty vectors select everything in
/// that dimension.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub coverages: Vec<f64>,
    /// Territory selections: numeric code spellings or mask labels.
    pub territories: Vec<String>,
    /// Per-level selections keyed by the declared level name.
    pub levels: Vec<(String, Vec<String>)>,
}

/// Borrowed filtered view over a dataset. The base rows are never copied or
/// mutated.
#[derive(Debug)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    pub rows: Vec<&'a CanonicalRecord>,
}

/// Applies the predicate set. Unknown level names are a caller error, not a
/// data condition.
pub fn filter<'a>(dataset: &'a Dataset, params: &QueryParams) -> Result<FilteredView<'a>> {
    let mut level_selections: Vec<(usize, &[String])> = Vec::new();
    for (name, values) in &params.levels {
        let key = name.trim().to_lowercase();
        let idx = dataset
            .level_keys
            .iter()
            .position(|k| *k == key)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown hierarchy level '{name}'; declared: {}",
                    dataset.level_keys.join(", ")
                )
            })?;
        if !values.is_empty() {
            level_selections.push((idx, values.as_slice()));
        }
    }

    let rows = dataset
        .rows
        .iter()
        .filter(|record| {
            if let Some(min) = params.year_min
                && record.year < min
            {
                return false;
            }
            if let Some(max) = params.year_max
                && record.year > max
            {
                return false;
            }
            if !params.coverages.is_empty() && !params.coverages.contains(&record.coverage) {
                return false;
            }
            if !params.territories.is_empty()
                && !params
                    .territories
                    .iter()
                    .any(|selection| record.territory.matches(selection))
            {
                return false;
            }
            for (idx, values) in &level_selections {
                match record.levels.get(*idx).and_then(|v| v.as_deref()) {
                    Some(value) => {
                        if !values.iter().any(|selected| selected == value) {
                            return false;
                        }
                    }
                    // An unresolved level never matches an explicit selection.
                    None => return false,
                }
            }
            true
        })
        .collect();
    Ok(FilteredView { dataset, rows })
}

/// A dimension rows can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDim {
    Year,
    Coverage,
    Territory,
    Level(usize),
}

impl GroupDim {
    /// Parses a dimension name against the canonical fields and the
    /// dataset's declared hierarchy levels.
    pub fn parse(name: &str, dataset: &Dataset) -> Result<Self> {
        let key = name.trim().to_lowercase();
        match key.as_str() {
            "year" => Ok(GroupDim::Year),
            "coverage" => Ok(GroupDim::Coverage),
            "territory" => Ok(GroupDim::Territory),
            _ => dataset
                .level_keys
                .iter()
                .position(|k| *k == key)
                .map(GroupDim::Level)
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown dimension '{name}'; expected year, coverage, territory{}",
                        if dataset.level_keys.is_empty() {
                            String::new()
                        } else {
                            format!(", or one of: {}", dataset.level_keys.join(", "))
                        }
                    )
                }),
        }
    }

    pub fn label(&self, dataset: &Dataset) -> String {
        match self {
            GroupDim::Year => "year".to_string(),
            GroupDim::Coverage => "coverage".to_string(),
            GroupDim::Territory => "territory".to_string(),
            GroupDim::Level(idx) => dataset
                .level_keys
                .get(*idx)
                .cloned()
                .unwrap_or_else(|| format!("level_{idx}")),
        }
    }

    fn value(&self, record: &CanonicalRecord, dataset: &Dataset) -> Option<String> {
        match self {
            GroupDim::Year => Some(record.year.to_string()),
            GroupDim::Coverage => Some(dataset.coverage_display(record.coverage)),
            GroupDim::Territory => Some(dataset.territory_display(&record.territory)),
            GroupDim::Level(idx) => record.levels.get(*idx).and_then(|v| v.clone()),
        }
    }
}

/// One aggregation output row: the group keys plus sum/mean/count of area.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<String>,
    pub sum: f64,
    pub mean: f64,
    pub count: usize,
}

impl<'a> FilteredView<'a> {
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_area(&self) -> f64 {
        self.rows.iter().map(|r| r.area).sum()
    }

    pub fn distinct_years(&self) -> Vec<i32> {
        self.rows.iter().map(|r| r.year).unique().sorted().collect()
    }

    pub fn distinct_coverages(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.coverage)
            .sorted_by(f64::total_cmp)
            .dedup()
            .collect()
    }

    /// Distinct territories in display order (numeric codes sorted
    /// numerically, mask labels alphabetically).
    pub fn distinct_territories(&self) -> Vec<Territory> {
        let mut seen = Vec::<Territory>::new();
        for record in &self.rows {
            if !seen.contains(&record.territory) {
                seen.push(record.territory.clone());
            }
        }
        seen.sort_by(|a, b| match (a, b) {
            (Territory::Code(x), Territory::Code(y)) => x.total_cmp(y),
            (Territory::Label(x), Territory::Label(y)) => x.cmp(y),
            (Territory::Code(_), Territory::Label(_)) => std::cmp::Ordering::Less,
            (Territory::Label(_), Territory::Code(_)) => std::cmp::Ordering::Greater,
        });
        seen
    }

    /// Distinct resolved values for one hierarchy level, sorted. Unresolved
    /// entries are omitted.
    pub fn distinct_level_values(&self, level: &str) -> Result<Vec<String>> {
        let key = level.trim().to_lowercase();
        let idx = self
            .dataset
            .level_keys
            .iter()
            .position(|k| *k == key)
            .ok_or_else(|| anyhow!("Unknown hierarchy level '{level}'"))?;
        Ok(self
            .rows
            .iter()
            .filter_map(|r| r.levels.get(idx).and_then(|v| v.clone()))
            .unique()
            .sorted()
            .collect())
    }

    /// Groups rows by the given dimensions and aggregates area as
    /// (sum, mean, count), sorted descending by sum. Ties keep first-seen
    /// input order. Rows whose group key is unresolved are excluded.
    pub fn aggregate(&self, dims: &[GroupDim]) -> Vec<AggregateRow> {
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut totals: HashMap<Vec<String>, (f64, usize)> = HashMap::new();
        for record in &self.rows {
            let Some(keys) = dims
                .iter()
                .map(|dim| dim.value(record, self.dataset))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            match totals.get_mut(&keys) {
                Some((sum, count)) => {
                    *sum += record.area;
                    *count += 1;
                }
                None => {
                    totals.insert(keys.clone(), (record.area, 1));
                    order.push(keys);
                }
            }
        }
        let mut rows = order
            .into_iter()
            .map(|keys| {
                let (sum, count) = totals[&keys];
                AggregateRow {
                    keys,
                    sum,
                    mean: sum / count as f64,
                    count,
                }
            })
            .collect::<Vec<_>>();
        // Stable sort: equal sums retain first-seen order.
        rows.sort_by(|a, b| b.sum.total_cmp(&a.sum));
        rows
    }

    /// Aggregation truncated to the top `n` groups by summed area.
    pub fn top_n(&self, dims: &[GroupDim], n: usize) -> Vec<AggregateRow> {
        let mut rows = self.aggregate(dims);
        if n > 0 && rows.len() > n {
            rows.truncate(n);
        }
        rows
    }
}

/// Year bounds for a range control. A degenerate single-year dataset gets
/// its lower bound moved down one year so a non-degenerate range remains
/// selectable; this is a documented special case, not a general rule.
pub fn slider_year_bounds(dataset: &Dataset) -> Option<(i32, i32)> {
    let (min, max) = dataset.year_bounds()?;
    if min == max {
        Some((min - 1, max))
    } else {
        Some((min, max))
    }
}
