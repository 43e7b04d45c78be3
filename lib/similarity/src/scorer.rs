//! Pairwise scorer
//!
//! Attaches the fuzzy token-sort similarity to blocking candidates and
//! resolves their row indices back to records.

use crate::distance::token_sort_ratio;
use matchx_core::{Candidate, CandidatePair, Record};

/// Scores candidates of one batch against its record list
pub struct PairScorer<'a> {
    batch_id: &'a str,
    records: &'a [Record],
}

impl<'a> PairScorer<'a> {
    pub fn new(batch_id: &'a str, records: &'a [Record]) -> Self {
        Self { batch_id, records }
    }

    /// Score one candidate; `None` if either index is outside the record list
    pub fn score(&self, candidate: &Candidate) -> Option<CandidatePair> {
        let a = self.records.get(candidate.id_1)?;
        let b = self.records.get(candidate.id_2)?;
        Some(CandidatePair {
            batch_id: self.batch_id.to_string(),
            id_1: candidate.id_1,
            id_2: candidate.id_2,
            record_a: a.reference.clone(),
            record_b: b.reference.clone(),
            combined_1: a.combined_text().to_string(),
            combined_2: b.combined_text().to_string(),
            vector_distance: candidate.distance,
            vector_score: candidate.vector_score,
            fuzzy_score: token_sort_ratio(a.combined_text(), b.combined_text()),
            confidence: 0.0,
            predicted_label: false,
            is_ambiguous: false,
        })
    }

    /// Score candidates in order, keeping those `keep` accepts
    pub fn score_all<F>(&self, candidates: &[Candidate], keep: F) -> Vec<CandidatePair>
    where
        F: Fn(&Record, &Record) -> bool,
    {
        candidates
            .iter()
            .filter(|c| match (self.records.get(c.id_1), self.records.get(c.id_2)) {
                (Some(a), Some(b)) => keep(a, b),
                _ => false,
            })
            .filter_map(|c| self.score(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchx_core::RecordRef;

    fn record(table: &str, row: usize, name: &str) -> Record {
        Record::new(RecordRef::new(table, row), vec![("name".to_string(), name.to_string())])
    }

    #[test]
    fn test_score_attaches_fuzzy_and_refs() {
        let records = vec![record("a", 0, "Sumber Makmur PT"), record("a", 1, "PT Sumber Makmur")];
        let scorer = PairScorer::new("batch", &records);
        let candidate = Candidate::canonical(0, 1, 0.25).unwrap();
        let pair = scorer.score(&candidate).unwrap();
        assert_eq!(pair.fuzzy_score, 100.0);
        assert_eq!(pair.record_b, RecordRef::new("a", 1));
        assert_eq!(pair.combined_1, "sumber makmur pt");
        assert!((pair.vector_score - 0.8).abs() < 1e-6);
        assert_eq!(pair.task_key(), "batch_0_1");
    }

    #[test]
    fn test_out_of_range_candidate_skipped() {
        let records = vec![record("a", 0, "x")];
        let scorer = PairScorer::new("batch", &records);
        assert!(scorer.score(&Candidate::canonical(0, 3, 1.0).unwrap()).is_none());
    }

    #[test]
    fn test_score_all_filter() {
        let records = vec![record("a", 0, "toko jaya"), record("a", 1, "toko jaya"), record("b", 0, "toko jaya")];
        let scorer = PairScorer::new("batch", &records);
        let candidates = vec![
            Candidate::canonical(0, 1, 0.0).unwrap(),
            Candidate::canonical(0, 2, 0.0).unwrap(),
            Candidate::canonical(1, 2, 0.0).unwrap(),
        ];
        let cross = scorer.score_all(&candidates, |a, b| a.reference.table != b.reference.table);
        assert_eq!(cross.len(), 2);
        assert_eq!(scorer.score_all(&candidates, |_, _| true).len(), 3);
    }
}
