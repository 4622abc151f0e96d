//! IO utilities for sample files and adjusted predictions.

pub mod samples_csv;

pub use samples_csv::{
    delimiter_for, read_samples_csv, write_adjusted_csv, LabeledSamples, SampleReaderConfig,
};
