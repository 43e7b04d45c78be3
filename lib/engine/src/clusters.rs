//! Duplicate clusters
//!
//! Positive pairs of a batch are edges; connected components are the
//! clusters. Each cluster lists its records in batch order, and clusters
//! are ordered by their first record.

use std::collections::BTreeMap;

use matchx_core::{MatchResult, RecordRef};

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Group the positive (MATCH or ENRICHED) results into clusters of two or
/// more records
pub fn duplicate_clusters(results: &[MatchResult]) -> Vec<Vec<RecordRef>> {
    // Batch index -> record, ordered so dense ids follow batch order
    let mut members: BTreeMap<usize, &RecordRef> = BTreeMap::new();
    let edges: Vec<(usize, usize)> = results
        .iter()
        .filter(|r| r.category.is_positive())
        .map(|r| {
            members.insert(r.pair.id_1, &r.pair.record_a);
            members.insert(r.pair.id_2, &r.pair.record_b);
            (r.pair.id_1, r.pair.id_2)
        })
        .collect();

    let dense: BTreeMap<usize, usize> = members.keys().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut set = DisjointSet::new(dense.len());
    for (a, b) in edges {
        set.union(dense[&a], dense[&b]);
    }

    let mut groups: BTreeMap<usize, Vec<RecordRef>> = BTreeMap::new();
    let mut first_of_root: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, record) in members.values().enumerate() {
        let root = set.find(i);
        // Members come in ascending order, so the first seen is the smallest
        let key = *first_of_root.entry(root).or_insert(i);
        groups.entry(key).or_default().push((*record).clone());
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use matchx_core::{CandidatePair, MatchCategory};

    fn result(a: usize, b: usize, category: MatchCategory) -> MatchResult {
        MatchResult {
            batch_id: "b".to_string(),
            source_table: "t".to_string(),
            reference_table: "t".to_string(),
            category,
            confidence: 0.9,
            pair: CandidatePair {
                batch_id: "b".to_string(),
                id_1: a,
                id_2: b,
                record_a: RecordRef::new("t", a),
                record_b: RecordRef::new("t", b),
                combined_1: String::new(),
                combined_2: String::new(),
                vector_distance: 0.1,
                vector_score: 0.9,
                fuzzy_score: 95.0,
                confidence: 0.9,
                predicted_label: category.is_positive(),
                is_ambiguous: false,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transitive_grouping() {
        let results = vec![
            result(5, 7, MatchCategory::Match),
            result(0, 1, MatchCategory::Enriched),
            result(1, 3, MatchCategory::Match),
            result(2, 4, MatchCategory::Unmatch),
            result(4, 6, MatchCategory::Ambiguous),
        ];
        let clusters = duplicate_clusters(&results);
        assert_eq!(
            clusters,
            vec![
                vec![RecordRef::new("t", 0), RecordRef::new("t", 1), RecordRef::new("t", 3)],
                vec![RecordRef::new("t", 5), RecordRef::new("t", 7)],
            ]
        );
    }

    #[test]
    fn test_no_positive_pairs() {
        let results = vec![result(0, 1, MatchCategory::Unmatch)];
        assert!(duplicate_clusters(&results).is_empty());
    }
}
