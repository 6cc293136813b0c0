//! PatternMatcher (§4.4): given STM and a candidate set of patterns,
//! produces ranked matches with past/present/future segmentation.

use kato_core::types::{Anomaly, Event, Pattern};
use kato_metrics::is_fuzzy_match;

/// One candidate pattern aligned against the current STM, with its temporal
/// segmentation and symbol-level accounting already computed.
#[derive(Debug, Clone)]
pub struct AlignedCandidate {
    pub pattern: Pattern,
    pub past: Vec<Event>,
    pub present: Vec<Event>,
    pub future: Vec<Event>,
    pub matches: Vec<String>,
    pub missing: Vec<String>,
    pub extras: Vec<String>,
    pub anomalies: Vec<Anomaly>,
}

/// True iff at least one symbol of `stm_event` token-matches at least one
/// symbol of `pattern_event` (exact equality, or fuzzy per §4.1).
fn event_matches(pattern_event: &Event, stm_event: &Event, fuzzy_threshold: f64) -> bool {
    pattern_event.iter().any(|p| {
        stm_event
            .iter()
            .any(|s| p == s || is_fuzzy_match(p, s, fuzzy_threshold))
    })
}

/// The best alignment window `[i, j]` of `pattern.events` against `stm`, by
/// greedy earliest-available-match subsequence embedding (optimal for
/// maximizing feasible window length, since leaving the STM pointer as early
/// as possible never forecloses a later match that a later pointer would
/// also have found).
struct Alignment {
    start: usize,
    end: usize,
    /// stm index each `pattern.events[start..=end]` entry aligned to.
    stm_indices: Vec<usize>,
    token_matches: usize,
}

fn best_alignment(pattern_events: &[Event], stm: &[Event], fuzzy_threshold: f64) -> Option<Alignment> {
    let mut best: Option<Alignment> = None;

    for start in 0..pattern_events.len() {
        let mut stm_ptr = 0usize;
        let mut stm_indices = Vec::new();
        let mut token_matches = 0usize;
        let mut end = start;

        for (k, pattern_event) in pattern_events.iter().enumerate().skip(start) {
            let found = (stm_ptr..stm.len())
                .find(|&m| event_matches(pattern_event, &stm[m], fuzzy_threshold));
            match found {
                Some(m) => {
                    stm_indices.push(m);
                    stm_ptr = m + 1;
                    end = k;
                    token_matches += count_token_matches(pattern_event, &stm[m], fuzzy_threshold);
                }
                None => break,
            }
        }

        if stm_indices.is_empty() {
            continue;
        }

        let window_len = end - start + 1;
        let candidate = Alignment {
            start,
            end,
            stm_indices,
            token_matches,
        };

        best = match best {
            None => Some(candidate),
            Some(current) => {
                let current_len = current.end - current.start + 1;
                if window_len > current_len
                    || (window_len == current_len && candidate.token_matches > current.token_matches)
                {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }

    best
}

fn count_token_matches(pattern_event: &Event, stm_event: &Event, fuzzy_threshold: f64) -> usize {
    pattern_event
        .iter()
        .filter(|p| {
            stm_event
                .iter()
                .any(|s| *p == s || is_fuzzy_match(p, s, fuzzy_threshold))
        })
        .count()
}

/// Align one candidate pattern against the STM and build its segmentation
/// (§4.4). Returns `None` if no window of the pattern aligns at all.
pub fn align(pattern: Pattern, stm: &[Event], fuzzy_threshold: f64) -> Option<AlignedCandidate> {
    let alignment = best_alignment(&pattern.events, stm, fuzzy_threshold)?;

    let past = pattern.events[..alignment.start].to_vec();
    let present = pattern.events[alignment.start..=alignment.end].to_vec();
    let future = pattern.events[alignment.end + 1..].to_vec();

    let mut matches = Vec::new();
    let mut missing = Vec::new();
    let mut extras = Vec::new();
    let mut anomalies = Vec::new();

    for (present_event, &stm_index) in present.iter().zip(alignment.stm_indices.iter()) {
        let stm_event = &stm[stm_index];

        for symbol in present_event {
            match stm_event.iter().find(|s| *s == symbol) {
                Some(_) => matches.push(symbol.clone()),
                None => match stm_event.iter().find(|s| is_fuzzy_match(symbol, s, fuzzy_threshold)) {
                    Some(observed) => {
                        matches.push(symbol.clone());
                        anomalies.push(Anomaly {
                            expected: symbol.clone(),
                            observed: observed.clone(),
                            similarity: kato_metrics::fuzzy_token_similarity(symbol, observed),
                        });
                    }
                    None => missing.push(symbol.clone()),
                },
            }
        }

        for symbol in stm_event {
            let covered = present_event.iter().any(|p| {
                p == symbol || is_fuzzy_match(p, symbol, fuzzy_threshold)
            });
            if !covered {
                extras.push(symbol.clone());
            }
        }
    }

    Some(AlignedCandidate {
        pattern,
        past,
        present,
        future,
        matches,
        missing,
        extras,
        anomalies,
    })
}
