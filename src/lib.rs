//! ScamScreen trainer
//!
//! Offline training for the local scam-message classifier: feature
//! extraction, vocabulary selection, logistic fitting and model artifact
//! merging.

pub mod classifier;
pub mod cli;
pub mod config;
