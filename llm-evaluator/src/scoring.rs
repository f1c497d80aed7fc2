//! Score extraction from judge rationales

use regex::Regex;
use std::sync::LazyLock;

static SCORE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([0-9]+)\]\]").expect("score marker pattern is valid"));

/// The first `[[N]]` marker in a rationale.
///
/// The value is not range-checked. A marker too large for `u32` counts as absent.
pub fn extract_score(rationale: &str) -> Option<u32> {
    SCORE_MARKER
        .captures(rationale)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Arithmetic mean of the present scores, or `None` if there are none
pub fn average_score<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let (sum, count) = scores
        .into_iter()
        .flatten()
        .fold((0u64, 0u64), |(sum, count), s| (sum + u64::from(s), count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}
