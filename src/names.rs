//! Display-name resolution helpers for composite territory names.
//!
//! Hierarchical sources encode a territory's full name as hyphen-joined
//! segments (`Amazonas-Leticia`), one segment per declared hierarchy level.

/// Splits a composite display name into at most `level_count` trimmed
/// segments. Empty segments stay unresolved in place; missing trailing
/// segments are padded with `None`; extra segments beyond the declared
/// levels are ignored.
pub fn decompose(name: &str, level_count: usize) -> Vec<Option<String>> {
    let mut segments = name
        .split('-')
        .map(|segment| segment.trim())
        .map(|segment| {
            if segment.is_empty() {
                None
            } else {
                Some(segment.to_string())
            }
        })
        .take(level_count)
        .collect::<Vec<_>>();
    segments.resize(level_count, None);
    segments
}

/// Renders a composite name with its level labels, e.g.
/// `Departamento: Meta | Municipio: Villavicencio`. Segments beyond the
/// declared levels are appended unlabeled.
pub fn labeled_display(name: &str, level_names: &[String]) -> String {
    if level_names.is_empty() || !name.contains('-') {
        return name.to_string();
    }
    name.split('-')
        .map(|segment| segment.trim())
        .enumerate()
        .map(|(idx, segment)| match level_names.get(idx) {
            Some(label) => format!("{label}: {segment}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
