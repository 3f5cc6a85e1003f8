//! Training runs
//!
//! Validates a loaded training set, fits the requested heads and merges the
//! result into the prior artifact.

use super::archive::archive_existing;
use super::artifact::ModelArtifact;
use super::dataset::{FunnelLabelSource, TrainingSet};
use super::design::{
    build_design_matrix, build_funnel_matrix, funnel_weights, ColumnLayout, DesignMatrix,
};
use super::features::{DenseEncoder, DenseFeatures};
use super::logistic::{GradientDescentFitter, LinearFit, LinearFitter};
use super::merge::{merge, ArtifactUpdate, HeadUpdate, TrainingAxes};
use super::ngram::extract_tokens;
use super::vocab::VocabularySelector;
use super::{TrainError, TrainResult};
use crate::config::TrainerConfig;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;

/// Fewest usable rows a run accepts
pub const MIN_TRAINING_ROWS: usize = 12;

/// What to train and where
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Labeled CSV file
    pub data_path: PathBuf,
    /// Model file; read as the prior artifact and overwritten
    pub out_path: PathBuf,
    pub axes: TrainingAxes,
    /// Copy the existing model into `old/models/` before overwriting
    pub archive: bool,
}

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub axes: TrainingAxes,
    /// Rows used for fitting
    pub usable_rows: usize,
    pub skipped_rows: usize,
    pub positives: usize,
    /// Tokens kept in the vocabulary (0 when tokens were not trained)
    pub vocabulary_size: usize,
    /// Min-count threshold that produced the vocabulary
    pub vocabulary_min_count: Option<usize>,
    /// Training accuracy of the primary head
    pub primary_accuracy: Option<f64>,
    /// Training accuracy of the funnel head
    pub funnel_accuracy: Option<f64>,
    pub funnel_source: Option<FunnelLabelSource>,
}

/// Result of `train_and_save`
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub report: TrainReport,
    pub model_path: PathBuf,
    /// Where the previous model was copied, if anywhere
    pub archived_to: Option<PathBuf>,
}

/// Fits heads for a set of axes
pub struct Trainer {
    encoder: DenseEncoder,
    selector: VocabularySelector,
    fitter: Box<dyn LinearFitter>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::from_config(&TrainerConfig::default())
    }
}

impl Trainer {
    pub fn new(
        encoder: DenseEncoder,
        selector: VocabularySelector,
        fitter: Box<dyn LinearFitter>,
    ) -> Self {
        Self {
            encoder,
            selector,
            fitter,
        }
    }

    pub fn from_config(config: &TrainerConfig) -> Self {
        Self::new(
            DenseEncoder::default(),
            VocabularySelector::from_config(&config.vocabulary),
            Box::new(GradientDescentFitter::from_config(&config.optimizer)),
        )
    }

    /// Train the requested axes and merge them into `prior`
    pub fn train(
        &self,
        set: &TrainingSet,
        prior: &ModelArtifact,
        axes: TrainingAxes,
    ) -> TrainResult<(ModelArtifact, TrainReport)> {
        let (update, report) = self.fit_update(set, axes)?;
        Ok((merge(prior, &update), report))
    }

    /// Fit every requested head without touching any artifact
    pub fn fit_update(
        &self,
        set: &TrainingSet,
        axes: TrainingAxes,
    ) -> TrainResult<(ArtifactUpdate, TrainReport)> {
        validate(set, axes)?;

        let encoder = &self.encoder;
        let dense: Vec<DenseFeatures> = set
            .examples
            .par_iter()
            .map(|e| encoder.encode(&e.message, &e.context))
            .collect();
        let labels = set.labels();
        let weights = set.sample_weights();

        let mut update = ArtifactUpdate::default();
        let mut report = TrainReport {
            axes,
            usable_rows: set.len(),
            skipped_rows: set.skipped_rows,
            positives: set.positives(),
            vocabulary_size: 0,
            vocabulary_min_count: None,
            primary_accuracy: None,
            funnel_accuracy: None,
            funnel_source: None,
        };

        if axes.needs_primary_fit() {
            let token_sets: Vec<HashSet<String>> = if axes.tokens {
                set.examples
                    .par_iter()
                    .map(|e| extract_tokens(&e.message))
                    .collect()
            } else {
                Vec::new()
            };
            let raw_labels: Vec<u8> = set.examples.iter().map(|e| e.label).collect();
            let mut vocab = axes
                .tokens
                .then(|| self.selector.select(&token_sets, &raw_labels));
            if vocab.as_ref().is_some_and(|v| v.is_empty()) {
                tracing::warn!(
                    "No tokens survived vocabulary selection, keeping existing token weights"
                );
                vocab = None;
            }
            if let Some(v) = &vocab {
                report.vocabulary_size = v.len();
                report.vocabulary_min_count = v.min_count();
                tracing::info!("Selected {} tokens (min count {:?})", v.len(), v.min_count());
            }

            // a tokens-only run with no vocabulary has nothing left to fit
            if axes.ai || vocab.is_some() {
                let layout = ColumnLayout::new(vocab.as_ref());
                let matrix = build_design_matrix(&dense, &token_sets, &layout);
                let fit = self.fitter.fit(&matrix, &labels, &weights);
                let accuracy = training_accuracy(&fit, &matrix, &labels);
                tracing::info!(
                    "Primary head: {} rows x {} columns, train_acc={:.1}%",
                    matrix.n_rows(),
                    matrix.n_columns(),
                    accuracy * 100.0
                );
                report.primary_accuracy = Some(accuracy);

                let (dense_weights, token_weights) = layout.split(&fit.coefficients);
                if axes.ai {
                    update.ai = Some(HeadUpdate {
                        intercept: fit.intercept,
                        weights: dense_weights,
                    });
                }
                if vocab.is_some() {
                    update.tokens = Some(token_weights);
                }
            }
        }

        if axes.funnel {
            let targets = set
                .funnel_targets()
                .ok_or(TrainError::SingleClassFunnelLabels)?;
            let matrix = build_funnel_matrix(&dense);
            let fit = self.fitter.fit(&matrix, &targets.labels, &weights);
            let accuracy = training_accuracy(&fit, &matrix, &targets.labels);
            tracing::info!(
                "Funnel head: targets from {}, train_acc={:.1}%",
                targets.source,
                accuracy * 100.0
            );
            report.funnel_accuracy = Some(accuracy);
            report.funnel_source = Some(targets.source);
            update.funnel = Some(HeadUpdate {
                intercept: fit.intercept,
                weights: funnel_weights(&fit.coefficients),
            });
        }

        Ok((update, report))
    }
}

/// Reject sets that cannot train the requested axes
fn validate(set: &TrainingSet, axes: TrainingAxes) -> TrainResult<()> {
    if set.is_empty() && set.skipped_rows == 0 {
        return Err(TrainError::EmptyTrainingSet);
    }
    if set.len() < MIN_TRAINING_ROWS {
        return Err(TrainError::NotEnoughRows {
            found: set.len(),
            required: MIN_TRAINING_ROWS,
        });
    }
    if axes.needs_primary_fit() && !set.has_both_labels() {
        return Err(TrainError::SingleClassLabels);
    }
    if axes.funnel && set.funnel_targets().is_none() {
        return Err(TrainError::SingleClassFunnelLabels);
    }
    Ok(())
}

fn training_accuracy(fit: &LinearFit, matrix: &DesignMatrix, labels: &[f64]) -> f64 {
    if matrix.n_rows() == 0 {
        return 0.0;
    }
    let correct = matrix
        .rows()
        .iter()
        .zip(labels)
        .filter(|(row, &y)| (fit.decision_sparse(row) >= 0.0) == (y >= 0.5))
        .count();
    correct as f64 / matrix.n_rows() as f64
}

/// Load data and prior model, train, archive the old file and write the new one.
/// Nothing is written when training fails.
pub fn train_and_save(options: &TrainOptions, config: &TrainerConfig) -> TrainResult<TrainSummary> {
    let set = TrainingSet::load(&options.data_path)?;
    tracing::info!(
        "Loaded {} usable rows ({} skipped) from {}",
        set.len(),
        set.skipped_rows,
        options.data_path.display()
    );

    let prior = ModelArtifact::load(&options.out_path);
    let trainer = Trainer::from_config(config);
    let (artifact, report) = trainer.train(&set, &prior, options.axes)?;

    let archived_to = if options.archive {
        archive_existing(&options.out_path)?
    } else {
        None
    };
    if let Some(path) = &archived_to {
        tracing::info!("Archived previous model to {}", path.display());
    }

    artifact.save(&options.out_path)?;
    tracing::info!("Model saved to {}", options.out_path.display());

    Ok(TrainSummary {
        report,
        model_path: options.out_path.clone(),
        archived_to,
    })
}
