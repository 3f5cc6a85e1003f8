//! CLI definition and handler

use crate::classifier::{train_and_save, TrainOptions, TrainingAxes, TrainingSet};
use crate::config::{load_trainer_config, TrainerConfig};
use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;

/// Parse and validate a learning rate (positive, finite)
fn parse_learning_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err("learning rate must be a positive number".to_string())
    }
}

/// Parse and validate an iteration count (at least 1)
fn parse_iterations(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("iterations must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// Train the local scam classifier from labeled chat messages
///
/// Without --ai/--tokens/--funnel every part of the model is retrained.
/// Parts that are not retrained are copied from the existing model file.
#[derive(Parser, Debug)]
#[command(name = "scamscreen-train")]
#[command(
    version,
    after_help = "\
Examples:
  scamscreen-train --data training.csv --out models/local-ai-model.json
  scamscreen-train --data training.csv --out model.json --funnel    Retrain only the funnel head
  scamscreen-train --data training.csv --stats                      Show dataset statistics"
)]
pub struct Cli {
    /// Labeled training data (CSV with a header row)
    #[arg(long)]
    pub data: PathBuf,

    /// Model file to update (read as the prior model, then overwritten)
    #[arg(long, required_unless_present = "stats")]
    pub out: Option<PathBuf>,

    /// Retrain the primary dense head
    #[arg(long)]
    pub ai: bool,

    /// Retrain the token weights
    #[arg(long)]
    pub tokens: bool,

    /// Retrain the funnel head
    #[arg(long)]
    pub funnel: bool,

    /// Trainer config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Gradient descent iterations (overrides config)
    #[arg(long, value_parser = parse_iterations)]
    pub iterations: Option<usize>,

    /// Gradient descent learning rate (overrides config)
    #[arg(long, value_parser = parse_learning_rate)]
    pub learning_rate: Option<f64>,

    /// Do not copy the existing model to old/models/ before overwriting
    #[arg(long)]
    pub no_archive: bool,

    /// Show training data statistics only
    #[arg(long)]
    pub stats: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,
}

impl Cli {
    pub fn axes(&self) -> TrainingAxes {
        TrainingAxes::from_flags(self.ai, self.tokens, self.funnel)
    }

    /// Layered config with command-line overrides applied
    pub fn trainer_config(&self) -> Result<TrainerConfig> {
        let mut config = load_trainer_config(self.config.as_deref())?;
        if let Some(iterations) = self.iterations {
            config.optimizer.iterations = iterations;
        }
        if let Some(rate) = self.learning_rate {
            config.optimizer.learning_rate = rate;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    if cli.stats {
        let set = TrainingSet::load(&cli.data)
            .with_context(|| format!("Failed to load training data from {}", cli.data.display()))?;
        println!("{}", set.stats());
        return Ok(());
    }

    let out = cli
        .out
        .clone()
        .context("--out is required unless --stats is given")?;
    let config = cli.trainer_config()?;
    let options = TrainOptions {
        data_path: cli.data.clone(),
        out_path: out,
        axes: cli.axes(),
        archive: !cli.no_archive,
    };

    tracing::info!("Training {} from {}", options.axes, options.data_path.display());
    let summary = train_and_save(&options, &config).context("Training failed")?;

    if let Some(archived) = &summary.archived_to {
        eprintln!("{}", style(format!("Previous model kept at {}", archived.display())).dim());
    }
    println!("Wrote model to {}", style(summary.model_path.display()).bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_default_to_all() {
        let cli = Cli::parse_from(["scamscreen-train", "--data", "d.csv", "--out", "m.json"]);
        assert_eq!(cli.axes(), TrainingAxes::ALL);
        assert!(!cli.no_archive);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_axis_flags() {
        let cli = Cli::parse_from([
            "scamscreen-train",
            "--data",
            "d.csv",
            "--out",
            "m.json",
            "--funnel",
        ]);
        let axes = cli.axes();
        assert!(axes.funnel && !axes.ai && !axes.tokens);
    }

    #[test]
    fn test_out_required_without_stats() {
        assert!(Cli::try_parse_from(["scamscreen-train", "--data", "d.csv"]).is_err());
        assert!(Cli::try_parse_from(["scamscreen-train", "--data", "d.csv", "--stats"]).is_ok());
    }

    #[test]
    fn test_override_validation() {
        assert!(parse_iterations("0").is_err());
        assert_eq!(parse_iterations("300"), Ok(300));
        assert!(parse_learning_rate("-1").is_err());
        assert!(parse_learning_rate("abc").is_err());
        assert_eq!(parse_learning_rate("0.5"), Ok(0.5));
    }
}
