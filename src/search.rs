//! Live substring search over resolved display names, used to narrow large
//! option sets before selection.

use std::fmt;

/// Case-insensitive substring containment. The empty term matches
/// everything; result order is the candidates' original order.
pub fn search<'a>(term: &str, candidates: &'a [String]) -> Vec<&'a String> {
    if term.is_empty() {
        return candidates.iter().collect();
    }
    let needle = term.to_lowercase();
    candidates
        .iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .collect()
}

const QUICK_PICKS: usize = 3;
const OVERFLOW: usize = 5;

/// Presentation split of a match list: the first 3 matches are quick-pick
/// suggestions, the next 5 an overflow listing, and any remainder is only
/// counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub quick_picks: Vec<String>,
    pub overflow: Vec<String>,
    pub remainder: usize,
}

pub fn summarize(matches: &[&String]) -> MatchSummary {
    let quick_picks = matches
        .iter()
        .take(QUICK_PICKS)
        .map(|m| m.to_string())
        .collect::<Vec<_>>();
    let overflow = matches
        .iter()
        .skip(QUICK_PICKS)
        .take(OVERFLOW)
        .map(|m| m.to_string())
        .collect::<Vec<_>>();
    let remainder = matches.len().saturating_sub(QUICK_PICKS + OVERFLOW);
    MatchSummary {
        quick_picks,
        overflow,
        remainder,
    }
}

impl fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pick in &self.quick_picks {
            writeln!(f, "> {pick}")?;
        }
        for item in &self.overflow {
            writeln!(f, "  {item}")?;
        }
        if self.remainder > 0 {
            writeln!(f, "  ... and {} more", self.remainder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring_containment() {
        let names = candidates(&["Amazonas", "Caquetá", "Putumayo"]);
        let matches = search("ama", &names);
        assert_eq!(matches, vec!["Amazonas"]);
    }

    #[test]
    fn empty_term_matches_everything_in_order() {
        let names = candidates(&["Putumayo", "Amazonas", "Caquetá"]);
        let matches = search("", &names);
        assert_eq!(matches, vec!["Putumayo", "Amazonas", "Caquetá"]);
    }

    #[test]
    fn match_order_is_candidate_order_not_relevance() {
        let names = candidates(&["Vichada", "Amazonas", "Casanare", "Vaupés"]);
        let matches = search("a", &names);
        assert_eq!(matches, vec!["Vichada", "Amazonas", "Casanare", "Vaupés"]);
    }

    #[test]
    fn summarize_splits_quick_picks_overflow_and_remainder() {
        let names = (0..12).map(|i| format!("Territorio {i}")).collect::<Vec<_>>();
        let matches = search("territorio", &names);
        let summary = summarize(&matches);
        assert_eq!(summary.quick_picks.len(), 3);
        assert_eq!(summary.overflow.len(), 5);
        assert_eq!(summary.remainder, 4);
        assert_eq!(summary.quick_picks[0], "Territorio 0");
    }

    #[test]
    fn summarize_handles_short_match_lists() {
        let names = candidates(&["Amazonas", "Caquetá"]);
        let matches = search("", &names);
        let summary = summarize(&matches);
        assert_eq!(summary.quick_picks.len(), 2);
        assert!(summary.overflow.is_empty());
        assert_eq!(summary.remainder, 0);
    }
}
