//! Character n-gram TF-IDF vectorizer
//!
//! Turns the combined text of each record into a dense, L2-normalized
//! TF-IDF row. The vocabulary is capped at `max_features` terms, picked by
//! corpus frequency with lexicographic tie breaking, so the same input
//! always produces the same matrix.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::matrix::DenseMatrix;
use crate::{Error, Result};

/// How text is cut into n-grams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// N-grams inside word boundaries; every word is padded with one space
    /// on each side
    CharWb,
    /// N-grams over the whole whitespace-normalized string
    Char,
}

/// Vectorizer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorizerConfig {
    pub analyzer: Analyzer,
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// Upper bound on vocabulary size, `None` keeps every term
    pub max_features: Option<usize>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            analyzer: Analyzer::CharWb,
            ngram_min: 2,
            ngram_max: 4,
            max_features: Some(1000),
        }
    }
}

impl VectorizerConfig {
    /// Settings used to compare column names
    #[must_use]
    pub fn column_names() -> Self {
        Self {
            analyzer: Analyzer::Char,
            ngram_min: 2,
            ngram_max: 3,
            max_features: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(Error::InvalidConfig(format!(
                "invalid n-gram range [{}, {}]",
                self.ngram_min, self.ngram_max
            )));
        }
        if self.max_features == Some(0) {
            return Err(Error::InvalidConfig("max_features must be positive".to_string()));
        }
        Ok(())
    }
}

/// Fitted vocabulary with inverse document frequencies
#[derive(Debug, Clone)]
pub struct Vocabulary {
    config: VectorizerConfig,
    terms: Vec<String>,
    index: AHashMap<String, usize>,
    idf: Vec<f32>,
}

impl Vocabulary {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in column order
    #[inline]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Vectorize documents against this vocabulary
    pub fn transform<S: AsRef<str>>(&self, docs: &[S]) -> DenseMatrix {
        let dim = self.terms.len();
        let mut matrix = DenseMatrix::zeros(docs.len(), dim);
        for (row, doc) in docs.iter().enumerate() {
            let counts = term_counts(doc.as_ref(), &self.config);
            let out = matrix.row_mut(row);
            for (term, count) in counts {
                if let Some(&col) = self.index.get(&term) {
                    out[col] = count as f32 * self.idf[col];
                }
            }
        }
        matrix.normalize_rows();
        matrix
    }
}

/// TF-IDF vectorizer over character n-grams
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
}

impl TfidfVectorizer {
    #[must_use]
    pub fn new(config: VectorizerConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Learn the vocabulary and IDF weights of a corpus
    pub fn fit<S: AsRef<str>>(&self, docs: &[S]) -> Result<Vocabulary> {
        self.config.validate()?;
        if docs.is_empty() {
            return Err(Error::EmptyInput("corpus".to_string()));
        }

        let mut corpus_tf: AHashMap<String, u64> = AHashMap::new();
        let mut df: AHashMap<String, u32> = AHashMap::new();
        for doc in docs {
            for (term, count) in term_counts(doc.as_ref(), &self.config) {
                *corpus_tf.entry(term.clone()).or_insert(0) += u64::from(count);
                *df.entry(term).or_insert(0) += 1;
            }
        }
        if corpus_tf.is_empty() {
            return Err(Error::NoText);
        }

        let mut ranked: Vec<(String, u64)> = corpus_tf.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(limit) = self.config.max_features {
            ranked.truncate(limit);
        }

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort_unstable();

        let n_docs = docs.len() as f32;
        let idf = terms
            .iter()
            .map(|term| {
                let d = df.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + n_docs) / (1.0 + d)).ln() + 1.0
            })
            .collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        Ok(Vocabulary {
            config: self.config.clone(),
            terms,
            index,
            idf,
        })
    }

    /// Fit on `docs` and return their matrix, rows aligned with `docs`
    pub fn fit_transform<S: AsRef<str>>(&self, docs: &[S]) -> Result<(Vocabulary, DenseMatrix)> {
        let vocabulary = self.fit(docs)?;
        let matrix = vocabulary.transform(docs);
        Ok((vocabulary, matrix))
    }
}

/// Count the n-grams of one document
fn term_counts(text: &str, config: &VectorizerConfig) -> AHashMap<String, u32> {
    let mut counts = AHashMap::new();
    let lowered = text.to_lowercase();
    match config.analyzer {
        Analyzer::CharWb => {
            for word in lowered.split_whitespace() {
                let padded: Vec<char> = std::iter::once(' ')
                    .chain(word.chars())
                    .chain(std::iter::once(' '))
                    .collect();
                for n in config.ngram_min..=config.ngram_max {
                    if padded.len() <= n {
                        // A word no longer than n is counted once, as a whole
                        *counts.entry(padded.iter().collect()).or_insert(0) += 1;
                        break;
                    }
                    for window in padded.windows(n) {
                        *counts.entry(window.iter().collect()).or_insert(0) += 1;
                    }
                }
            }
        }
        Analyzer::Char => {
            let normalized: Vec<char> = lowered
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .collect();
            for n in config.ngram_min..=config.ngram_max.min(normalized.len()) {
                for window in normalized.windows(n) {
                    *counts.entry(window.iter().collect()).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_wb_ngrams_stay_inside_words() {
        let config = VectorizerConfig {
            ngram_min: 2,
            ngram_max: 2,
            ..Default::default()
        };
        let counts = term_counts("ab cd", &config);
        assert_eq!(counts.get(" a"), Some(&1));
        assert_eq!(counts.get("b "), Some(&1));
        assert!(!counts.contains_key("b c"));
        assert_eq!(counts.get(" c"), Some(&1));
    }

    #[test]
    fn test_short_word_counted_once() {
        let config = VectorizerConfig {
            ngram_min: 2,
            ngram_max: 4,
            ..Default::default()
        };
        let counts = term_counts("a", &config);
        assert_eq!(counts.get(" a"), Some(&1));
        assert_eq!(counts.get(" a "), Some(&1));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_token_order_does_not_change_char_wb_vector() {
        let vectorizer = TfidfVectorizer::default();
        let (_, m) = vectorizer
            .fit_transform(&["pt sumber makmur", "sumber makmur pt", "toko jaya abadi"])
            .unwrap();
        assert!(m.squared_l2(0, 1) < 1e-6);
        assert!(m.squared_l2(0, 2) > 0.5);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let vectorizer = TfidfVectorizer::default();
        let (_, m) = vectorizer.fit_transform(&["alpha beta", "gamma"]).unwrap();
        for row in 0..m.rows() {
            let norm: f32 = m.row(row).iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_max_features_and_determinism() {
        let config = VectorizerConfig {
            max_features: Some(5),
            ..Default::default()
        };
        let docs = ["jalan merdeka", "jalan sudirman", "merdeka barat"];
        let a = TfidfVectorizer::new(config.clone()).fit(&docs).unwrap();
        let b = TfidfVectorizer::new(config).fit(&docs).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a.terms(), b.terms());
        let mut sorted = a.terms().to_vec();
        sorted.sort();
        assert_eq!(sorted, a.terms());
    }

    #[test]
    fn test_empty_inputs() {
        let vectorizer = TfidfVectorizer::default();
        let empty: [&str; 0] = [];
        assert!(matches!(vectorizer.fit(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(vectorizer.fit(&["", "   "]), Err(Error::NoText)));
    }

    #[test]
    fn test_char_analyzer_for_column_names() {
        let vectorizer = TfidfVectorizer::new(VectorizerConfig::column_names());
        let (_, m) = vectorizer
            .fit_transform(&["customer_name", "customer name", "zip"])
            .unwrap();
        let close = crate::simd::dot_simd(m.row(0), m.row(1));
        let far = crate::simd::dot_simd(m.row(0), m.row(2));
        assert!(close > far);
    }
}
