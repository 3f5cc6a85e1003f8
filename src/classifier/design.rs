//! Design matrix assembly
//!
//! Row `i` is the dense encoding of example `i` followed by one 0/1 column
//! per vocabulary token, in vocabulary order. The dense block always
//! occupies the first `DENSE_FEATURE_COUNT` columns.

use super::features::{
    DenseFeatures, DENSE_FEATURE_COUNT, DENSE_FEATURE_NAMES, FUNNEL_FEATURE_NAMES,
};
use super::vocab::Vocabulary;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

/// Non-zero entries of one row as `(column, value)`, ascending by column
pub type SparseRow = Vec<(usize, f64)>;

/// Row-major sparse feature matrix handed to a `LinearFitter`
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    rows: Vec<SparseRow>,
    columns: usize,
}

impl DesignMatrix {
    pub fn new(rows: Vec<SparseRow>, columns: usize) -> Self {
        debug_assert!(rows.iter().flatten().all(|&(j, _)| j < columns));
        Self { rows, columns }
    }

    /// Build from fully populated rows, keeping only non-zero entries
    pub fn from_dense(rows: Vec<Vec<f64>>, columns: usize) -> Self {
        let rows = rows.iter().map(|row| non_zero(row, 0)).collect();
        Self::new(rows, columns)
    }

    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns
    }
}

fn non_zero(values: &[f64], offset: usize) -> SparseRow {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(j, &v)| (offset + j, v))
        .collect()
}

/// Column names of a primary design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    tokens: IndexSet<String>,
}

impl ColumnLayout {
    /// Layout for a dense-only matrix, or dense + `vocab` tokens
    pub fn new(vocab: Option<&Vocabulary>) -> Self {
        let tokens = vocab
            .map(|v| v.tokens().map(str::to_string).collect())
            .unwrap_or_default();
        Self { tokens }
    }

    /// Token columns in vocabulary order
    pub fn tokens(&self) -> &IndexSet<String> {
        &self.tokens
    }

    pub fn width(&self) -> usize {
        DENSE_FEATURE_COUNT + self.tokens.len()
    }

    /// Column of a token, if it is in the layout
    pub fn token_column(&self, token: &str) -> Option<usize> {
        self.tokens
            .get_index_of(token)
            .map(|i| DENSE_FEATURE_COUNT + i)
    }

    /// Split fitted coefficients at the dense boundary into named dense
    /// weights and token weights.
    pub fn split(
        &self,
        coefficients: &[f64],
    ) -> (IndexMap<String, f64>, IndexMap<String, f64>) {
        let boundary = DENSE_FEATURE_COUNT.min(coefficients.len());
        let (dense, rest) = coefficients.split_at(boundary);

        let dense = DENSE_FEATURE_NAMES
            .iter()
            .zip(dense)
            .map(|(name, &w)| (name.to_string(), w))
            .collect();
        let tokens = self
            .tokens
            .iter()
            .zip(rest)
            .map(|(token, &w)| (token.clone(), w))
            .collect();
        (dense, tokens)
    }
}

/// Dense block plus token presence indicators
pub fn build_design_matrix(
    dense: &[DenseFeatures],
    token_sets: &[HashSet<String>],
    layout: &ColumnLayout,
) -> DesignMatrix {
    let rows = dense
        .iter()
        .enumerate()
        .map(|(i, features)| {
            let mut row = non_zero(features.values(), 0);
            if let Some(present) = token_sets.get(i).filter(|_| !layout.tokens.is_empty()) {
                let mut token_columns: Vec<usize> = present
                    .iter()
                    .filter_map(|token| layout.token_column(token))
                    .collect();
                token_columns.sort_unstable();
                row.extend(token_columns.into_iter().map(|j| (j, 1.0)));
            }
            row
        })
        .collect();
    DesignMatrix::new(rows, layout.width())
}

/// Funnel-head matrix over `FUNNEL_FEATURE_NAMES`
pub fn build_funnel_matrix(dense: &[DenseFeatures]) -> DesignMatrix {
    let rows = dense.iter().map(DenseFeatures::funnel_values).collect();
    DesignMatrix::from_dense(rows, FUNNEL_FEATURE_NAMES.len())
}

/// Name funnel-head coefficients
pub fn funnel_weights(coefficients: &[f64]) -> IndexMap<String, f64> {
    FUNNEL_FEATURE_NAMES
        .iter()
        .zip(coefficients)
        .map(|(name, &w)| (name.to_string(), w))
        .collect()
}
