use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use multibalance::io::SampleReaderConfig;
use multibalance::{BalanceConfig, FairnessGoal, LossAggregation};

use crate::util::validate_tsv_or_csv_file;

/// Everything one `multibalance adjust` / `summary` run needs. Loaded from an
/// optional JSON file, then overridden from the command line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceRunConfig {
    pub input: String,
    pub columns: SampleReaderConfig,
    pub balance: BalanceConfig,
    /// Seed for sampling adjusted labels; entropy-seeded when absent.
    pub seed: Option<u64>,
    pub summary_json: Option<String>,
    pub predictions: Option<String>,
    pub report: Option<String>,
}

/// Load a run configuration from a JSON file. Missing fields take defaults.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<BalanceRunConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: BalanceRunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// Look up an optional argument that only some subcommands define.
fn opt_arg<'a, T>(matches: &'a ArgMatches, id: &str) -> Option<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    matches.try_get_one::<T>(id).ok().flatten()
}

impl BalanceRunConfig {
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                log::info!("[multibalance::cli] Using config: {:?}", path);
                load_run_config(path)?
            }
            None => BalanceRunConfig::default(),
        };

        // Apply CLI overrides
        if let Some(input) = opt_arg::<String>(matches, "input") {
            config.input = input.clone();
        }
        if config.input.is_empty() {
            anyhow::bail!("No input file given on the command line or in the config");
        }
        validate_tsv_or_csv_file(&config.input)?;

        if let Some(col) = opt_arg::<String>(matches, "y_true_col") {
            config.columns.y_true_column = col.clone();
        }
        if let Some(col) = opt_arg::<String>(matches, "y_pred_col") {
            config.columns.y_pred_column = col.clone();
        }
        if let Some(col) = opt_arg::<String>(matches, "group_col") {
            config.columns.group_column = col.clone();
        }

        if let Some(goal) = opt_arg::<String>(matches, "goal") {
            config.balance.goal = goal.parse::<FairnessGoal>()?;
        }
        if let Some(loss) = opt_arg::<String>(matches, "loss") {
            config.balance.loss = loss.parse::<LossAggregation>()?;
        }
        if let Some(seed) = opt_arg::<u64>(matches, "seed") {
            config.seed = Some(*seed);
        }

        if let Some(path) = opt_arg::<String>(matches, "summary_json") {
            config.summary_json = Some(path.clone());
        }
        if let Some(path) = opt_arg::<String>(matches, "predictions") {
            config.predictions = Some(path.clone());
        }
        if let Some(path) = opt_arg::<String>(matches, "report") {
            config.report = Some(path.clone());
        }

        Ok(config)
    }
}
