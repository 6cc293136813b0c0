//! Pure, side-effect-free numeric kernel for the prediction pipeline (§4.1).
//!
//! Every function here is deterministic given its inputs: summation always
//! proceeds in the order the caller supplies (callers are expected to hand
//! in sorted collections where order matters), so results are stable across
//! platforms and process restarts.

use std::collections::{BTreeMap, BTreeSet};

/// Case-insensitive normalized edit-distance ratio in `[0, 1]`. Exact
/// equality (after lowercasing) is `1.0`.
pub fn fuzzy_token_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// A token pair is a fuzzy match iff `ratio >= fuzzy_token_threshold` and
/// `ratio < 1`; fuzzy matching is disabled entirely when the threshold is 0.
pub fn is_fuzzy_match(a: &str, b: &str, fuzzy_token_threshold: f64) -> bool {
    if fuzzy_token_threshold <= 0.0 {
        return false;
    }
    let ratio = fuzzy_token_similarity(a, b);
    ratio >= fuzzy_token_threshold && ratio < 1.0
}

/// Shannon entropy over the multiset of symbol frequencies in a matched
/// region, normalized to `[0, 1]` by `log2` of the distinct symbol count. 0
/// when the region is empty or holds a single distinct symbol.
pub fn normalized_entropy(symbol_counts: &BTreeMap<String, usize>) -> f64 {
    let distinct = symbol_counts.len();
    if distinct <= 1 {
        return 0.0;
    }
    let total: usize = symbol_counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let raw_entropy: f64 = symbol_counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            if p > 0.0 {
                -p * p.log2()
            } else {
                0.0
            }
        })
        .sum();
    raw_entropy / (distinct as f64).log2()
}

/// Inverse-token-frequency x document-frequency weighting of the
/// intersection between a pattern's symbol bag and the STM's symbol bag,
/// normalized to `[0, 1]` as a weighted Jaccard index.
///
/// `document_frequency` maps a symbol to how many patterns in the corpus
/// contain it; symbols absent from the map are treated as unique (weight
/// 1.0).
pub fn itfdf_similarity(
    pattern_symbols: &BTreeSet<String>,
    stm_symbols: &BTreeSet<String>,
    document_frequency: &BTreeMap<String, f64>,
) -> f64 {
    let weight = |symbol: &str| -> f64 {
        let df = document_frequency.get(symbol).copied().unwrap_or(0.0);
        1.0 / (1.0 + df)
    };

    let union: BTreeSet<&String> = pattern_symbols.union(stm_symbols).collect();
    if union.is_empty() {
        return 0.0;
    }

    let mut intersection_weight = 0.0;
    let mut union_weight = 0.0;
    for symbol in union {
        let w = weight(symbol);
        union_weight += w;
        if pattern_symbols.contains(symbol) && stm_symbols.contains(symbol) {
            intersection_weight += w;
        }
    }

    if union_weight == 0.0 {
        0.0
    } else {
        intersection_weight / union_weight
    }
}

/// `len(matches) / (len(matches) + len(missing))` when the denominator is
/// positive; 0 otherwise.
pub fn confidence(matches: usize, missing: usize) -> f64 {
    let denom = matches + missing;
    if denom == 0 {
        0.0
    } else {
        matches as f64 / denom as f64
    }
}

/// `|matches| / max(|present_events|, 1)`.
pub fn evidence(matches: usize, present_events: usize) -> f64 {
    matches as f64 / present_events.max(1) as f64
}

/// Per-prediction energy combining negative-log similarity and confidence.
/// Lower is better: a perfect match (`similarity = 1`, `confidence = 1`) has
/// energy 0.
pub fn hamiltonian_energy(similarity: f64, confidence: f64) -> f64 {
    const EPSILON: f64 = 1e-9;
    let similarity = similarity.clamp(0.0, 1.0).max(EPSILON);
    let confidence = confidence.clamp(0.0, 1.0);
    -similarity.ln() + (1.0 - confidence)
}

/// Summed energy over all present events; used only as a tie-breaker.
pub fn grand_hamiltonian(per_event_energies: &[f64]) -> f64 {
    per_event_energies.iter().sum()
}

/// Product of confidence across per-event contributions, treated as a
/// probability proxy.
pub fn confluence(per_event_confidences: &[f64]) -> f64 {
    per_event_confidences.iter().product()
}
