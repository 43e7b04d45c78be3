//! Data preparation
//!
//! Turns raw table rows into [`Record`]s: keeps the selected columns, drops
//! rows with a missing or blank selected value, drops exact duplicate
//! rows, and caches the combined text. Two-table runs concatenate table A
//! then table B.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use matchx_core::store::ColumnStore;
use matchx_core::{Error, Record, RecordRef, Result};

/// What to match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub table_a: String,
    pub columns_a: Vec<String>,
    /// Reference table; `None` (or `table_a` again) deduplicates table A
    #[serde(default)]
    pub table_b: Option<String>,
    /// Columns of table B, defaulting to `columns_a`
    #[serde(default)]
    pub columns_b: Option<Vec<String>>,
}

impl MatchRequest {
    /// Deduplicate a single table
    pub fn single(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table_a: table.into(),
            columns_a: columns,
            table_b: None,
            columns_b: None,
        }
    }

    /// Link two tables
    pub fn cross(
        table_a: impl Into<String>,
        columns_a: Vec<String>,
        table_b: impl Into<String>,
        columns_b: Vec<String>,
    ) -> Self {
        Self {
            table_a: table_a.into(),
            columns_a,
            table_b: Some(table_b.into()),
            columns_b: Some(columns_b),
        }
    }

    /// Whether both sides are the same table
    pub fn is_self_match(&self) -> bool {
        self.table_b.as_deref().map_or(true, |b| b == self.table_a)
    }

    /// The table the batch is compared against
    pub fn reference_table(&self) -> &str {
        self.table_b.as_deref().unwrap_or(&self.table_a)
    }
}

/// Records ready for vectorization
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub records: Vec<Record>,
    pub source_table: String,
    pub reference_table: String,
    pub self_match: bool,
}

impl PreparedBatch {
    pub fn texts(&self) -> Vec<&str> {
        self.records.iter().map(Record::combined_text).collect()
    }
}

/// Clean rows of one table
pub fn prepare_table(store: &dyn ColumnStore, table: &str, columns: &[String]) -> Result<Vec<Record>> {
    if columns.is_empty() {
        return Err(Error::NoColumns(table.to_string()));
    }
    let available = store.columns(table)?;
    if let Some(missing) = columns.iter().find(|c| !available.contains(c)) {
        return Err(Error::UnknownColumn {
            table: table.to_string(),
            column: missing.clone(),
        });
    }

    let rows = store.rows(table)?;
    if rows.is_empty() {
        return Err(Error::EmptyInput(table.to_string()));
    }

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut records = Vec::new();
    let mut incomplete = 0;
    let mut duplicates = 0;
    for (i, row) in rows.iter().enumerate() {
        let values: Option<Vec<String>> = columns
            .iter()
            .map(|c| row.get(c).filter(|v| !v.trim().is_empty()).map(str::to_string))
            .collect();
        let Some(values) = values else {
            incomplete += 1;
            continue;
        };
        if !seen.insert(values.clone()) {
            duplicates += 1;
            continue;
        }
        let fields = columns.iter().cloned().zip(values).collect();
        records.push(Record::new(RecordRef::new(table, i), fields));
    }

    debug!(
        "table {}: {} rows, {} incomplete, {} duplicates, {} kept",
        table,
        rows.len(),
        incomplete,
        duplicates,
        records.len()
    );
    Ok(records)
}

/// Validate a request and load its records
pub fn prepare_request(store: &dyn ColumnStore, request: &MatchRequest) -> Result<PreparedBatch> {
    let mut records = prepare_table(store, &request.table_a, &request.columns_a)?;
    let self_match = request.is_self_match();
    if !self_match {
        let columns_b = request.columns_b.as_ref().unwrap_or(&request.columns_a);
        records.extend(prepare_table(store, request.reference_table(), columns_b)?);
    }

    if records.iter().all(|r| r.combined_text().is_empty()) {
        return Err(Error::NoText);
    }
    if records.len() < 2 {
        return Err(Error::InsufficientRows(records.len()));
    }

    Ok(PreparedBatch {
        records,
        source_table: request.table_a.clone(),
        reference_table: request.reference_table().to_string(),
        self_match,
    })
}
