//! Local scam classifier training
//!
//! Turns labeled chat messages into the linear model artifact read by the
//! in-game scorer.
//!
//! Pipeline: CSV rows → dense features (+ n-gram tokens → vocabulary) →
//! design matrix → logistic fit → selective merge into the prior artifact.
//!
//! The artifact has three independently trainable parts: the primary dense
//! head, the token weights and the funnel head. A run only rewrites the
//! parts it trains; everything else is carried over from the file on disk.

pub mod archive;
pub mod artifact;
pub mod dataset;
pub mod design;
pub mod features;
pub mod logistic;
pub mod merge;
pub mod ngram;
pub mod train;
pub mod vocab;

pub use artifact::{FunnelHead, ModelArtifact, ARTIFACT_VERSION, DEFAULT_INTERCEPT};
pub use dataset::{
    Channel, DatasetStats, FunnelLabelSource, FunnelTargets, MessageContext, TrainingExample,
    TrainingSet,
};
pub use design::{ColumnLayout, DesignMatrix, SparseRow};
pub use features::{
    DenseEncoder, DenseFeatures, FeatureTables, DENSE_FEATURE_COUNT, DENSE_FEATURE_NAMES,
    FUNNEL_FEATURE_NAMES,
};
pub use logistic::{GradientDescentFitter, LinearFit, LinearFitter};
pub use merge::{merge, ArtifactUpdate, HeadUpdate, TrainingAxes};
pub use ngram::extract_tokens;
pub use train::{
    train_and_save, TrainOptions, TrainReport, TrainSummary, Trainer, MIN_TRAINING_ROWS,
};
pub use vocab::{Vocabulary, VocabularyEntry, VocabularySelector};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a training run
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("No rows found in training data.")]
    EmptyTrainingSet,

    #[error("Not enough samples: need at least {required} rows labeled 0 or 1, found {found}.")]
    NotEnoughRows { found: usize, required: usize },

    #[error("Need both labels 0 and 1 in training data to train the primary model.")]
    SingleClassLabels,

    #[error("Funnel training needs both classes in the funnel or primary labels.")]
    SingleClassFunnelLabels,

    #[error("Training file not found: {}", .0.display())]
    MissingTrainingFile(PathBuf),

    #[error("Failed to read training data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize model: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TrainResult<T> = Result<T, TrainError>;
