//! Configuration for the trainer
//!
//! This module handles:
//! - Optimizer hyperparameters
//! - Vocabulary size and min-count cascade
//! - User-level and explicit TOML config files

mod trainer_config;

pub use trainer_config::{load_trainer_config, OptimizerConfig, TrainerConfig, VocabularyConfig};
