//! Trainer configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. User config (`~/.config/scamscreen/trainer.toml`)
//! 3. An explicit `--config <path>` file
//! 4. Command-line overrides (applied by the caller)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrainerConfig {
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub vocabulary: VocabularyConfig,
}

/// Gradient descent settings for every fit in a run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OptimizerConfig {
    /// Full-batch iterations
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// L2 penalty on coefficients (not the intercept)
    #[serde(default = "default_l2")]
    pub l2: f64,
}

fn default_iterations() -> usize {
    1200
}

fn default_learning_rate() -> f64 {
    0.22
}

fn default_l2() -> f64 {
    0.01
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            learning_rate: default_learning_rate(),
            l2: default_l2(),
        }
    }
}

/// Token vocabulary settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VocabularyConfig {
    /// Maximum number of tokens kept (never above 5000)
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Minimum per-token example counts, tried in order
    #[serde(default = "default_min_counts")]
    pub min_counts: Vec<usize>,
}

fn default_max_size() -> usize {
    crate::classifier::vocab::MAX_VOCAB_SIZE
}

fn default_min_counts() -> Vec<usize> {
    crate::classifier::vocab::MIN_COUNT_CASCADE.to_vec()
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            min_counts: default_min_counts(),
        }
    }
}

impl TrainerConfig {
    /// Path of the user-level config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("scamscreen").join("trainer.toml"))
    }

    /// Sanity-check values that would make training meaningless
    pub fn validate(&self) -> Result<()> {
        if self.optimizer.iterations == 0 {
            anyhow::bail!("optimizer.iterations must be at least 1");
        }
        if !(self.optimizer.learning_rate.is_finite() && self.optimizer.learning_rate > 0.0) {
            anyhow::bail!("optimizer.learning_rate must be a positive number");
        }
        if !(self.optimizer.l2.is_finite() && self.optimizer.l2 >= 0.0) {
            anyhow::bail!("optimizer.l2 must be zero or positive");
        }
        if self.vocabulary.min_counts.contains(&0) {
            anyhow::bail!("vocabulary.min_counts entries must be at least 1");
        }
        Ok(())
    }
}

/// Load trainer configuration.
///
/// Files are layered key by key, so an explicit file only overrides the
/// keys it sets. A broken user config is logged and skipped. An explicit
/// `--config` file must exist and parse.
pub fn load_trainer_config(explicit: Option<&Path>) -> Result<TrainerConfig> {
    let mut layered = toml::Table::new();

    if let Some(user_path) = TrainerConfig::user_config_path().filter(|p| p.exists()) {
        match load_toml_table(&user_path) {
            Ok(table) => {
                debug!("Loaded user config from {}", user_path.display());
                merge_tables(&mut layered, table);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", user_path.display(), e);
            }
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let table = load_toml_table(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        merge_tables(&mut layered, table);
    }

    let config: TrainerConfig = toml::Value::Table(layered)
        .try_into()
        .context("Invalid trainer configuration")?;
    Ok(config)
}

/// Read a TOML file and check that it deserializes on its own
fn load_toml_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&content)?;
    toml::Value::Table(table.clone()).try_into::<TrainerConfig>()?;
    Ok(table)
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let incoming = match value {
            toml::Value::Table(incoming) => incoming,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}
