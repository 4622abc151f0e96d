//! Drivers behind the `adjust` and `summary` subcommands.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use multibalance::io::{read_samples_csv, write_adjusted_csv, LabeledSamples};
use multibalance::report::html::render_report;
use multibalance::{MulticlassBalancer, Summary};

use super::input::BalanceRunConfig;

fn load_balancer(config: &BalanceRunConfig) -> Result<(LabeledSamples, MulticlassBalancer)> {
    let samples = read_samples_csv(&config.input, &config.columns)?;
    let balancer = MulticlassBalancer::new(&samples.y_true, &samples.y_pred, &samples.groups)
        .with_context(|| format!("Failed to build balancer from {}", config.input))?;
    Ok((samples, balancer))
}

/// Summary of the unadjusted classifier.
pub fn run_summary(config: &BalanceRunConfig) -> Result<Summary> {
    let (_, balancer) = load_balancer(config)?;
    let summary = balancer.summary();
    write_outputs(config, &summary, "multibalance: unadjusted summary")?;
    Ok(summary)
}

/// Solve for the configured goal and loss, then write whatever outputs the
/// config asks for.
pub fn run_adjust(config: &BalanceRunConfig) -> Result<Summary> {
    let (samples, mut balancer) = load_balancer(config)?;
    balancer.adjust_with(&config.balance)?;
    let summary = balancer.summary();

    if let Some(path) = &config.predictions {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let adjusted = balancer.predict(&samples.y_pred, &samples.groups, &mut rng)?;
        let probabilities = balancer.predict_proba(&samples.y_pred, &samples.groups)?;
        write_adjusted_csv(path, &samples, &adjusted, &probabilities, balancer.classes())?;
        log::info!(
            "[multibalance::cli] wrote {} adjusted predictions to {}",
            adjusted.len(),
            path
        );
    }

    let title = format!(
        "multibalance: goal={} loss={}",
        config.balance.goal, config.balance.loss
    );
    write_outputs(config, &summary, &title)?;
    Ok(summary)
}

fn write_outputs(config: &BalanceRunConfig, summary: &Summary, title: &str) -> Result<()> {
    if let Some(path) = &config.summary_json {
        write_summary_json(path, summary)?;
    }
    if let Some(path) = &config.report {
        write_report(path, summary, title)?;
    }
    Ok(())
}

pub fn write_summary_json<P: AsRef<Path>>(path: P, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write summary: {}", path.as_ref().display()))?;
    log::info!(
        "[multibalance::cli] summary written to {}",
        path.as_ref().display()
    );
    Ok(())
}

pub fn write_report<P: AsRef<Path>>(path: P, summary: &Summary, title: &str) -> Result<()> {
    let html = render_report(summary, title)?;
    fs::write(&path, html)
        .with_context(|| format!("Failed to write report: {}", path.as_ref().display()))?;
    log::info!(
        "[multibalance::cli] report written to {}",
        path.as_ref().display()
    );
    Ok(())
}
