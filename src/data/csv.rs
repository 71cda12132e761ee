//! CSV format dataset implementation
//!
//! Supports loading regression datasets from CSV files where:
//! - The last column is the target
//! - All other columns are features
//! - First row can be headers (automatically detected)

use crate::core::{Dataset, RVMError, Result, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for CSV format files
#[derive(Debug, Clone)]
pub struct CSVDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl CSVDataset {
    /// Load a dataset from a CSV file
    ///
    /// The last column is assumed to be the target.
    /// Headers are automatically detected if present.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(RVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader, detecting a header row
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, true)
    }

    /// Load a dataset from a reader with explicit header option
    pub fn from_reader_with_options<R: BufRead>(
        reader: R,
        auto_detect_header: bool,
    ) -> Result<Self> {
        let mut samples = Vec::new();
        let mut dimensions = 0;
        let mut seen_first_row = false;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(RVMError::IoError)?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Only the first non-comment row can be a header
            let first_row = !seen_first_row;
            seen_first_row = true;
            if first_row && auto_detect_header && Self::is_header_line(line) {
                continue;
            }

            let (sample, n_features) = Self::parse_data_line(line).map_err(|e| {
                RVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            dimensions = dimensions.max(n_features);
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(RVMError::EmptyDataset);
        }

        Ok(CSVDataset {
            samples,
            dimensions,
        })
    }

    /// Check if a line appears to be a header
    fn is_header_line(line: &str) -> bool {
        let fields: Vec<&str> = line.split(',').collect();

        if fields.len() < 2 {
            return false;
        }

        // Most feature columns non-numeric means column names
        let n_features = fields.len() - 1;
        let non_numeric_count = fields
            .iter()
            .take(n_features)
            .filter(|field| field.trim().parse::<f64>().is_err())
            .count();

        non_numeric_count * 2 > n_features
    }

    /// Parse a CSV data line into a sample and its feature column count
    fn parse_data_line(line: &str) -> Result<(Sample, usize)> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let Some((target_str, feature_fields)) = fields.split_last() else {
            return Err(RVMError::ParseError("Empty line".to_string()));
        };
        if feature_fields.is_empty() {
            return Err(RVMError::ParseError(format!(
                "Line has too few fields: {line}"
            )));
        }

        let target = target_str
            .parse::<f64>()
            .map_err(|_| RVMError::ParseError(format!("Invalid target: {target_str}")))?;
        if !target.is_finite() {
            return Err(RVMError::ParseError(format!(
                "Target must be finite: {target_str}"
            )));
        }

        let mut dense = Vec::with_capacity(feature_fields.len());
        for (idx, field) in feature_fields.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| {
                RVMError::ParseError(format!("Invalid feature value at column {}: {}", idx + 1, field))
            })?;
            dense.push(value);
        }

        // Only non-zero values are stored
        let features = SparseVector::from_dense(dense.iter());
        Ok((Sample::new(features, target), feature_fields.len()))
    }
}

impl Dataset for CSVDataset {
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
