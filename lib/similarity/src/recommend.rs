//! Column recommendations
//!
//! Suggests which text columns are worth matching on, and which columns of
//! two tables likely hold the same attribute.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::ratio;
use matchx_core::simd::dot_simd;
use matchx_core::{Row, TfidfVectorizer, VectorizerConfig};

pub const MIN_NON_NULL_RATIO: f64 = 0.8;
pub const MIN_AVG_LENGTH: f64 = 3.0;
pub const MIN_UNIQUE_VALUES: usize = 10;
pub const MAX_COLUMN_RECOMMENDATIONS: usize = 5;

pub const MAPPING_THRESHOLD: f64 = 0.5;
pub const MAX_MAPPINGS: usize = 10;
const MAPPING_TFIDF_WEIGHT: f64 = 0.6;
const MAPPING_FUZZY_WEIGHT: f64 = 0.4;

/// Quality profile of a candidate matching column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub column: String,
    pub quality_score: f64,
    pub non_null_ratio: f64,
    pub avg_length: f64,
    pub unique_count: usize,
}

/// Proposed correspondence between a column of table A and one of table B
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column_a: String,
    pub column_b: String,
    pub similarity_score: f64,
    pub fuzzy_score: f64,
}

fn profile(column: &str, rows: &[Row]) -> Option<ColumnQuality> {
    let values: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.trim().is_empty())
        .collect();
    if values.is_empty() || rows.is_empty() {
        return None;
    }
    // Numeric columns are not text, even when stored as strings
    if values.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        return None;
    }

    let non_null_ratio = values.len() as f64 / rows.len() as f64;
    let avg_length = values.iter().map(|v| v.chars().count()).sum::<usize>() as f64 / values.len() as f64;
    let unique_count = values.iter().collect::<AHashSet<_>>().len();

    let quality_score = 0.4 * non_null_ratio
        + 0.3 * (avg_length / 20.0).min(1.0)
        + 0.3 * (unique_count as f64 / 100.0).min(1.0);

    Some(ColumnQuality {
        column: column.to_string(),
        quality_score,
        non_null_ratio,
        avg_length,
        unique_count,
    })
}

/// Text columns mostly filled with varied, non-trivial values, best first
pub fn recommend_columns(columns: &[String], rows: &[Row]) -> Vec<ColumnQuality> {
    let mut out: Vec<ColumnQuality> = columns
        .iter()
        .filter_map(|c| profile(c, rows))
        .filter(|q| {
            q.non_null_ratio > MIN_NON_NULL_RATIO
                && q.avg_length > MIN_AVG_LENGTH
                && q.unique_count > MIN_UNIQUE_VALUES
        })
        .collect();
    out.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
    out.truncate(MAX_COLUMN_RECOMMENDATIONS);
    out
}

/// Likely column correspondences between two tables, best first.
///
/// Names are compared with character n-gram TF-IDF cosine, blended with
/// the fuzzy ratio of the lowercased names.
pub fn recommend_column_mapping(columns_a: &[String], columns_b: &[String]) -> Vec<ColumnMapping> {
    if columns_a.is_empty() || columns_b.is_empty() {
        return Vec::new();
    }

    let names: Vec<&str> = columns_a.iter().chain(columns_b).map(String::as_str).collect();
    let matrix = match TfidfVectorizer::new(VectorizerConfig::column_names()).fit_transform(&names) {
        Ok((_, matrix)) => Some(matrix),
        Err(e) => {
            debug!("column names have no n-grams, using fuzzy ratio only: {}", e);
            None
        }
    };

    let mut out = Vec::new();
    for (i, a) in columns_a.iter().enumerate() {
        for (j, b) in columns_b.iter().enumerate() {
            let cosine = matrix
                .as_ref()
                .map(|m| f64::from(dot_simd(m.row(i), m.row(columns_a.len() + j))))
                .unwrap_or(0.0);
            let fuzzy = ratio(&a.to_lowercase(), &b.to_lowercase());
            let combined = MAPPING_TFIDF_WEIGHT * cosine + MAPPING_FUZZY_WEIGHT * fuzzy / 100.0;
            if combined > MAPPING_THRESHOLD {
                out.push(ColumnMapping {
                    column_a: a.clone(),
                    column_b: b.clone(),
                    similarity_score: combined,
                    fuzzy_score: fuzzy,
                });
            }
        }
    }
    out.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    out.truncate(MAX_MAPPINGS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(column: &str, values: &[Option<&str>]) -> Vec<Row> {
        values
            .iter()
            .map(|v| Row::new(vec![(column.to_string(), v.map(str::to_string))]))
            .collect()
    }

    fn names(n: usize) -> Vec<Option<String>> {
        (0..n).map(|i| Some(format!("customer name {}", i))).collect()
    }

    #[test]
    fn test_recommends_varied_text_column() {
        let values = names(20);
        let mut table: Vec<Row> = values
            .iter()
            .map(|v| {
                Row::new(vec![
                    ("name".to_string(), v.clone()),
                    ("code".to_string(), Some("ab".to_string())),
                    ("amount".to_string(), Some("1234.5".to_string())),
                ])
            })
            .collect();
        table.push(Row::new(vec![("name".to_string(), None)]));

        let columns = vec!["name".to_string(), "code".to_string(), "amount".to_string()];
        let out = recommend_columns(&columns, &table);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].column, "name");
        assert_eq!(out[0].unique_count, 20);
        assert!((out[0].non_null_ratio - 20.0 / 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_column_rejected() {
        let mut values: Vec<Option<&str>> = vec![None; 10];
        values.extend(["alpha one", "beta two"].iter().map(|s| Some(*s)));
        let out = recommend_columns(&["notes".to_string()], &rows("notes", &values));
        assert!(out.is_empty());
    }

    #[test]
    fn test_quality_score_formula() {
        let q = profile("name", &rows("name", &[Some("abcd"), Some("efgh")])).unwrap();
        let expected = 0.4 * 1.0 + 0.3 * (4.0 / 20.0) + 0.3 * (2.0 / 100.0);
        assert!((q.quality_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mapping_finds_same_names() {
        let a = vec!["customer_name".to_string(), "address".to_string(), "zip".to_string()];
        let b = vec!["Address".to_string(), "CustomerName".to_string(), "phone".to_string()];
        let out = recommend_column_mapping(&a, &b);
        assert!(out.iter().any(|m| m.column_a == "address" && m.column_b == "Address"));
        assert!(out.iter().any(|m| m.column_a == "customer_name" && m.column_b == "CustomerName"));
        assert!(!out.iter().any(|m| m.column_b == "phone"));
        for w in out.windows(2) {
            assert!(w[0].similarity_score >= w[1].similarity_score);
        }
    }

    #[test]
    fn test_mapping_empty_side() {
        assert!(recommend_column_mapping(&[], &["a".to_string()]).is_empty());
    }
}
