//! Process-wide memoization of built datasets.
//!
//! Harmonizing a large extract is the only expensive step in the engine, so
//! datasets are cached keyed by (source name, full source configuration) and
//! shared as `Arc`. An edited catalog entry therefore misses the cache and
//! rebuilds. The cache is invalidated wholesale, never entry by entry.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use anyhow::Result;
use encoding_rs::Encoding;
use log::debug;

use crate::{config::SourceConfig, dataset::Dataset};

type CacheKey = (String, SourceConfig);

fn cache() -> &'static Mutex<HashMap<CacheKey, Arc<Dataset>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<Dataset>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the cached dataset for this source, building and inserting it on
/// first use.
pub fn fetch_or_build(
    source: &str,
    config: &SourceConfig,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Arc<Dataset>> {
    let key = (source.to_string(), config.clone());
    if let Some(dataset) = cache().lock().expect("dataset cache poisoned").get(&key) {
        debug!("Dataset cache hit for '{source}'");
        return Ok(Arc::clone(dataset));
    }
    let dataset = Arc::new(Dataset::build(source, config, delimiter, encoding)?);
    cache()
        .lock()
        .expect("dataset cache poisoned")
        .insert(key, Arc::clone(&dataset));
    Ok(dataset)
}

/// Drops every cached dataset. Used on explicit refresh requests.
pub fn clear() {
    let mut guard = cache().lock().expect("dataset cache poisoned");
    if !guard.is_empty() {
        debug!("Clearing {} cached dataset(s)", guard.len());
    }
    guard.clear();
}
