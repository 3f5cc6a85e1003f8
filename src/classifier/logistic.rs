//! Binary logistic regression
//!
//! `LinearFitter` is the seam between feature assembly and the optimiser:
//! anything that returns one coefficient per column plus an intercept can
//! stand in. `GradientDescentFitter` is the built-in implementation.

use super::design::DesignMatrix;
use crate::config::OptimizerConfig;

/// Result of a linear fit
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    /// One coefficient per design-matrix column
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearFit {
    /// Raw logit for one row
    pub fn decision(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }

    /// Raw logit for one design-matrix row
    pub fn decision_sparse(&self, row: &[(usize, f64)]) -> f64 {
        self.intercept + dot(&self.coefficients, row)
    }
}

fn dot(weights: &[f64], row: &[(usize, f64)]) -> f64 {
    row.iter()
        .map(|&(j, v)| weights.get(j).copied().unwrap_or(0.0) * v)
        .sum()
}

/// Fits a linear binary classifier to labels in {0, 1}
pub trait LinearFitter {
    fn fit(&self, x: &DesignMatrix, y: &[f64], sample_weight: &[f64]) -> LinearFit;
}

/// Full-batch gradient descent on weighted log loss with L2 on coefficients
#[derive(Debug, Clone)]
pub struct GradientDescentFitter {
    pub iterations: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for GradientDescentFitter {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

impl GradientDescentFitter {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            iterations: config.iterations,
            learning_rate: config.learning_rate,
            l2: config.l2,
        }
    }
}

impl LinearFitter for GradientDescentFitter {
    fn fit(&self, x: &DesignMatrix, y: &[f64], sample_weight: &[f64]) -> LinearFit {
        let columns = x.n_columns();
        let mut weights = vec![0.0f64; columns];
        let mut bias = 0.0f64;

        let total_weight: f64 = sample_weight.iter().take(x.n_rows()).sum();
        if x.n_rows() == 0 || total_weight <= 0.0 {
            return LinearFit {
                coefficients: weights,
                intercept: bias,
            };
        }

        let mut grad_w = vec![0.0f64; columns];
        for _ in 0..self.iterations {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (row, (&label, &w)) in x.rows().iter().zip(y.iter().zip(sample_weight)) {
                let err = (sigmoid(bias + dot(&weights, row)) - label) * w;
                for &(j, v) in row {
                    grad_w[j] += err * v;
                }
                grad_b += err;
            }

            for (weight, g) in weights.iter_mut().zip(&grad_w) {
                let step = g / total_weight + self.l2 * *weight;
                *weight -= self.learning_rate * step;
            }
            bias -= self.learning_rate * grad_b / total_weight;
        }

        LinearFit {
            coefficients: weights,
            intercept: bias,
        }
    }
}

pub fn sigmoid(z: f64) -> f64 {
    let z = z.clamp(-30.0, 30.0);
    1.0 / (1.0 + (-z).exp())
}
