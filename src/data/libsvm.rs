//! LibSVM format dataset implementation
//!
//! Supports loading regression datasets in the libsvm format:
//! target index:value index:value ...
//!
//! Example:
//! 0.84 1:0.5 3:1.2
//! -1.7 2:0.3 5:2.1

use crate::core::{Dataset, RVMError, Result, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for LibSVM format files
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(RVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(RVMError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line) {
                Ok(sample) => {
                    dimensions = dimensions.max(sample.features.implied_dim());
                    samples.push(sample);
                }
                Err(e) => {
                    return Err(RVMError::ParseError(format!(
                        "Error parsing line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }

        if samples.is_empty() {
            return Err(RVMError::EmptyDataset);
        }

        Ok(LibSVMDataset {
            samples,
            dimensions,
        })
    }

    /// Build a dataset from samples already in memory
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let dimensions = samples
            .iter()
            .map(|s| s.features.implied_dim())
            .max()
            .unwrap_or(0);
        Self {
            samples,
            dimensions,
        }
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<Sample> {
        let mut parts = line.split_whitespace();

        let target_str = parts
            .next()
            .ok_or_else(|| RVMError::ParseError("Empty line".to_string()))?;
        let target = target_str
            .parse::<f64>()
            .map_err(|_| RVMError::ParseError(format!("Invalid target: {target_str}")))?;
        if !target.is_finite() {
            return Err(RVMError::ParseError(format!(
                "Target must be finite: {target_str}"
            )));
        }

        let mut indices = Vec::new();
        let mut values = Vec::new();

        for feature_str in parts {
            let (index_str, value_str) = feature_str.split_once(':').ok_or_else(|| {
                RVMError::ParseError(format!("Invalid feature format: {feature_str}"))
            })?;

            let index = index_str.parse::<usize>().map_err(|_| {
                RVMError::ParseError(format!("Invalid feature index: {index_str}"))
            })?;

            let value = value_str.parse::<f64>().map_err(|_| {
                RVMError::ParseError(format!("Invalid feature value: {value_str}"))
            })?;

            // libsvm uses 1-based indexing, convert to 0-based
            if index == 0 {
                return Err(RVMError::ParseError(format!(
                    "Feature index must be positive: {index}"
                )));
            }

            if value != 0.0 {
                indices.push(index - 1);
                values.push(value);
            }
        }

        Ok(Sample::new(SparseVector::new(indices, values), target))
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.target).collect()
    }
}
