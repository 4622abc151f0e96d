//! Delimited-text reader for `(true label, predicted label, group)` rows and
//! writer for adjusted predictions.
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};

/// Labels read from a sample file, one entry per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSamples {
    pub y_true: Vec<String>,
    pub y_pred: Vec<String>,
    pub groups: Vec<String>,
}

impl LabeledSamples {
    pub fn len(&self) -> usize {
        self.y_true.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_true.is_empty()
    }
}

/// Column names for reading sample files. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleReaderConfig {
    pub y_true_column: String,
    pub y_pred_column: String,
    pub group_column: String,
    /// Field delimiter; inferred from the file extension when `None`.
    pub delimiter: Option<char>,
}

impl Default for SampleReaderConfig {
    fn default() -> Self {
        Self {
            y_true_column: "y_true".to_string(),
            y_pred_column: "y_pred".to_string(),
            group_column: "group".to_string(),
            delimiter: None,
        }
    }
}

/// Tab for `.tsv`/`.tab`, comma otherwise.
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

pub fn read_samples_csv<P: AsRef<Path>>(path: P, config: &SampleReaderConfig) -> Result<LabeledSamples> {
    let delimiter = match config.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => return Err(anyhow!("Delimiter must be a single ASCII character, got '{}'", c)),
        None => delimiter_for(&path),
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open sample file: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read sample header row")?
        .clone();

    let column = |name: &str| {
        find_column(&headers, name).ok_or_else(|| anyhow!("Missing column '{}'", name))
    };
    let y_true_idx = column(&config.y_true_column)?;
    let y_pred_idx = column(&config.y_pred_column)?;
    let group_idx = column(&config.group_column)?;

    let mut samples = LabeledSamples::default();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let field = |idx: usize, name: &str| -> Result<String> {
            record
                .get(idx)
                .map(|v| v.trim().to_string())
                .ok_or_else(|| anyhow!("Missing '{}' value at row {}", name, row_idx + 1))
        };
        samples.y_true.push(field(y_true_idx, &config.y_true_column)?);
        samples.y_pred.push(field(y_pred_idx, &config.y_pred_column)?);
        samples.groups.push(field(group_idx, &config.group_column)?);
    }

    log::debug!(
        "[multibalance::io] read {} rows from {}",
        samples.len(),
        path.as_ref().display()
    );
    Ok(samples)
}

/// Write the input labels, the sampled adjusted label and one probability
/// column per class (`p_<class>`).
pub fn write_adjusted_csv<P: AsRef<Path>>(
    path: P,
    samples: &LabeledSamples,
    adjusted: &[String],
    probabilities: &[Vec<f64>],
    classes: &[String],
) -> Result<()> {
    if adjusted.len() != samples.len() || probabilities.len() != samples.len() {
        return Err(anyhow!(
            "Adjusted output has {} labels and {} probability rows for {} samples",
            adjusted.len(),
            probabilities.len(),
            samples.len()
        ));
    }
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_writer(BufWriter::new(file));

    let mut header = vec![
        "y_true".to_string(),
        "y_pred".to_string(),
        "group".to_string(),
        "y_adjusted".to_string(),
    ];
    header.extend(classes.iter().map(|c| format!("p_{}", c)));
    writer.write_record(&header)?;

    for i in 0..samples.len() {
        let mut row = vec![
            samples.y_true[i].clone(),
            samples.y_pred[i].clone(),
            samples.groups[i].clone(),
            adjusted[i].clone(),
        ];
        row.extend(probabilities[i].iter().map(|p| format!("{:.6}", p)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
