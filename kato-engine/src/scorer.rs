//! PredictionScorer (§4.5): scores and ranks aligned candidates into the
//! final ordered prediction list.

use crate::matcher::AlignedCandidate;
use kato_core::types::{Prediction, RankSortAlgo, SessionConfig};
use std::collections::{BTreeMap, BTreeSet};

/// Turn one aligned candidate into a scored [`Prediction`]. `stm_symbols` is
/// the full STM's symbol bag (§4.1/§4.5), not just the aligned present
/// window — similarity is defined over the whole STM, the present window
/// only bounds the per-event energies.
fn score(candidate: AlignedCandidate, stm_symbols: &BTreeSet<String>) -> Prediction {
    let AlignedCandidate {
        pattern,
        past,
        present,
        future,
        matches,
        missing,
        extras,
        anomalies,
    } = candidate;

    let pattern_symbols: BTreeSet<String> =
        pattern.symbol_bag().into_iter().map(str::to_string).collect();
    // The corpus-wide document-frequency table is not tracked by the
    // capability-contract stores; symbols are treated as unique (weight 1),
    // degrading itfdf to a plain weighted Jaccard index.
    let document_frequency = BTreeMap::new();
    let similarity = kato_metrics::itfdf_similarity(&pattern_symbols, stm_symbols, &document_frequency);

    let confidence = kato_metrics::confidence(matches.len(), missing.len());
    let evidence = kato_metrics::evidence(matches.len(), present.len());

    let mut symbol_counts: BTreeMap<String, usize> = BTreeMap::new();
    for symbol in pattern.events.iter().flatten() {
        *symbol_counts.entry(symbol.clone()).or_insert(0) += 1;
    }
    let entropy = kato_metrics::normalized_entropy(&symbol_counts);

    let per_event_confidence = confidence;
    let per_event_energies: Vec<f64> = present
        .iter()
        .map(|_| kato_metrics::hamiltonian_energy(similarity, per_event_confidence))
        .collect();
    let hamiltonian = per_event_energies.first().copied().unwrap_or(0.0);
    let grand_hamiltonian = kato_metrics::grand_hamiltonian(&per_event_energies);
    let confluence = kato_metrics::confluence(&vec![per_event_confidence; present.len().max(1)]);

    Prediction {
        name: pattern.identity.to_wire(),
        past,
        present,
        future,
        matches,
        missing,
        extras,
        anomalies,
        similarity,
        confidence,
        evidence,
        entropy,
        frequency: pattern.frequency,
        emotives: pattern.aggregated_emotives(),
        metadata: pattern.metadata_accumulator.clone(),
        hamiltonian,
        grand_hamiltonian,
        confluence,
    }
}

fn sort_key(prediction: &Prediction, algo: RankSortAlgo) -> (f64, String) {
    let primary = match algo {
        RankSortAlgo::Similarity => -prediction.similarity,
        RankSortAlgo::Confidence => -prediction.confidence,
        RankSortAlgo::Evidence => -prediction.evidence,
        RankSortAlgo::GrandHamiltonian => prediction.grand_hamiltonian,
    };
    (primary, prediction.name.clone())
}

/// Score every aligned candidate against the STM's symbol bag, discard those
/// below `recall_threshold`, rank by `config.rank_sort_algo` (lexicographic
/// pattern-identity tie-break), and truncate to `config.max_predictions`
/// (§4.4, §4.5, §6).
pub fn rank(
    candidates: Vec<AlignedCandidate>,
    stm_symbols: &BTreeSet<String>,
    config: &SessionConfig,
) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = candidates
        .into_iter()
        .map(|candidate| score(candidate, stm_symbols))
        .filter(|p| p.similarity >= config.recall_threshold)
        .collect();

    predictions.sort_by(|a, b| {
        let ka = sort_key(a, config.rank_sort_algo);
        let kb = sort_key(b, config.rank_sort_algo);
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });

    predictions.truncate(config.max_predictions);
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::align;
    use kato_core::traits::events_symbol_bag;
    use kato_core::types::{Event, Pattern};
    use std::collections::BTreeMap as Map;

    fn ev(symbols: &[&str]) -> Event {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn below_recall_threshold_is_discarded() {
        let pattern = Pattern::new(vec![ev(&["a"]), ev(&["b"]), ev(&["c"])], Map::new(), Map::new(), "kb1");
        let stm = vec![ev(&["z"])]; // no overlap at all -> similarity 0, won't even align
        assert!(align(pattern, &stm, 0.0).is_none());
    }

    #[test]
    fn ranking_respects_similarity_descending() {
        let strong = Pattern::new(vec![ev(&["a", "b"])], Map::new(), Map::new(), "kb1");
        let weak = Pattern::new(vec![ev(&["a", "z"])], Map::new(), Map::new(), "kb1");
        let stm = vec![ev(&["a", "b"])];
        let stm_symbols = events_symbol_bag(&stm);

        let mut config = SessionConfig::default();
        config.recall_threshold = 0.0;

        let aligned: Vec<_> = vec![strong, weak]
            .into_iter()
            .filter_map(|p| align(p, &stm, 0.0))
            .collect();
        let ranked = rank(aligned, &stm_symbols, &config);

        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].similarity >= ranked[1].similarity);
    }

    #[test]
    fn max_predictions_truncates() {
        let mut config = SessionConfig::default();
        config.recall_threshold = 0.0;
        config.max_predictions = 1;

        let a = Pattern::new(vec![ev(&["a"])], Map::new(), Map::new(), "kb1");
        let b = Pattern::new(vec![ev(&["a"])], Map::new(), Map::new(), "kb1");
        let stm = vec![ev(&["a"])];
        let stm_symbols = events_symbol_bag(&stm);

        let aligned: Vec<_> = vec![a, b]
            .into_iter()
            .filter_map(|p| align(p, &stm, 0.0))
            .collect();
        let ranked = rank(aligned, &stm_symbols, &config);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn similarity_uses_full_stm_bag_not_just_present() {
        // Scenario 3: STM {foo, hello} vs pattern {hello, world, test} ->
        // ITFDF (unweighted Jaccard) = |{hello}| / |{foo,hello,world,test}| = 0.25,
        // not the present-window-only 0.667 a prior bug produced.
        let pattern = Pattern::new(
            vec![ev(&["hello", "world"]), ev(&["test"])],
            Map::new(),
            Map::new(),
            "kb1",
        );
        let stm = vec![ev(&["foo", "hello"])];
        let stm_symbols = events_symbol_bag(&stm);

        let mut config = SessionConfig::default();
        config.recall_threshold = 0.0;

        let aligned = align(pattern, &stm, 0.0).expect("pattern should align");
        let ranked = rank(vec![aligned], &stm_symbols, &config);

        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].similarity - 0.25).abs() < 1e-9, "similarity was {}", ranked[0].similarity);
    }
}
