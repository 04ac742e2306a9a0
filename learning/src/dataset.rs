use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column carrying the classification label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelColumn {
    /// Label is the first column of every row (MNIST CSV convention).
    First,
    /// Label is the column with this header name.
    Named(String),
}

/// Options controlling how a tabular source is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Which column carries the label.
    pub label_column: LabelColumn,
    /// Whether the first row is a header row.
    pub has_headers: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            label_column: LabelColumn::First,
            has_headers: true,
        }
    }
}

/// Single labeled sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Fixed-length numeric feature vector.
    pub features: Vec<f32>,
    /// Class label.
    pub label: u32,
}

/// Ordered sequence of samples sharing one feature dimensionality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Samples in source order.
    pub samples: Vec<Sample>,
}

impl Dataset {
    /// Returns the feature dimensionality.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.samples.first().map_or(0, |sample| sample.features.len())
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the dataset holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First `n` samples, for debug displays.
    #[must_use]
    pub fn head(&self, n: usize) -> &[Sample] {
        &self.samples[..n.min(self.samples.len())]
    }

    /// Splits the dataset into aligned feature and label sequences.
    #[must_use]
    pub fn features_labels(&self) -> (Vec<Vec<f32>>, Vec<u32>) {
        let mut features = Vec::with_capacity(self.samples.len());
        let mut labels = Vec::with_capacity(self.samples.len());
        for Sample { features: f, label } in &self.samples {
            features.push(f.clone());
            labels.push(*label);
        }
        (features, labels)
    }
}

/// Errors raised while loading a tabular dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Malformed cell in a data row.
    #[error("schema error at line {line}: {detail}")]
    Schema {
        /// 1-based source line of the offending row.
        line: usize,
        /// What was wrong with the row.
        detail: String,
    },
    /// Named label column absent from the header row.
    #[error("label column {0:?} not found in header")]
    MissingLabelColumn(String),
    /// A named label column only works on sources with headers.
    #[error("a named label column requires a header row")]
    HeadersRequired,
    /// I/O error (filesystem).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV-level failure, including inconsistent row lengths.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads a labeled tabular dataset from a CSV file.
///
/// Every non-label column must parse as a numeric feature; the label column
/// must parse as an unsigned integer.
pub fn load_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Dataset, DatasetError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(options.has_headers)
        .from_path(path.as_ref())?;

    let label_index = match &options.label_column {
        LabelColumn::First => 0,
        LabelColumn::Named(name) => {
            if !options.has_headers {
                return Err(DatasetError::HeadersRequired);
            }
            reader
                .headers()?
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| DatasetError::MissingLabelColumn(name.clone()))?
        }
    };

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let line = row + 1 + usize::from(options.has_headers);
        let label_cell = record.get(label_index).ok_or_else(|| DatasetError::Schema {
            line,
            detail: format!("row has {} columns, label expected at column {label_index}", record.len()),
        })?;
        let label: u32 = label_cell.trim().parse().map_err(|_| DatasetError::Schema {
            line,
            detail: format!("label {label_cell:?} is not an unsigned integer"),
        })?;
        let mut features = Vec::with_capacity(record.len().saturating_sub(1));
        for (column, cell) in record.iter().enumerate() {
            if column == label_index {
                continue;
            }
            let value: f32 = cell.trim().parse().map_err(|_| DatasetError::Schema {
                line,
                detail: format!("feature column {column} value {cell:?} is not numeric"),
            })?;
            features.push(value);
        }
        samples.push(Sample { features, label });
    }
    Ok(Dataset { samples })
}

/// Splits a dataset into train/holdout partitions without reordering.
#[must_use]
pub fn train_test_split(dataset: &Dataset, holdout_ratio: f32) -> (Dataset, Dataset) {
    let split =
        ((1.0 - holdout_ratio).clamp(0.1, 0.9) * dataset.samples.len() as f32).round() as usize;
    let mut train = Dataset::default();
    let mut test = Dataset::default();
    for (index, sample) in dataset.samples.iter().enumerate() {
        if index < split {
            train.samples.push(sample.clone());
        } else {
            test.samples.push(sample.clone());
        }
    }
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_label_first_with_headers() {
        let (_dir, path) = write_csv("label,p1,p2\n0,1.5,2.0\n1,3.0,4.5\n");
        let dataset = load_csv(&path, &CsvOptions::default()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.feature_dim(), 2);
        assert_eq!(dataset.samples[0].label, 0);
        assert_eq!(dataset.samples[1].features, vec![3.0, 4.5]);
        assert_eq!(dataset.head(5).len(), 2);
        assert_eq!(dataset.head(1)[0].label, 0);
    }

    #[test]
    fn loads_named_label_column_anywhere_in_row() {
        let (_dir, path) = write_csv("x,label,y\n0.5,7,0.25\n1.5,3,0.75\n");
        let options = CsvOptions {
            label_column: LabelColumn::Named("label".into()),
            has_headers: true,
        };
        let dataset = load_csv(&path, &options).unwrap();
        assert_eq!(dataset.samples[0].label, 7);
        assert_eq!(dataset.samples[0].features, vec![0.5, 0.25]);
        assert_eq!(dataset.samples[1].label, 3);
    }

    #[test]
    fn loads_headerless_label_first() {
        let (_dir, path) = write_csv("2,0.1,0.2\n4,0.3,0.4\n");
        let options = CsvOptions {
            label_column: LabelColumn::First,
            has_headers: false,
        };
        let dataset = load_csv(&path, &options).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.samples[1].label, 4);
    }

    #[test]
    fn non_numeric_feature_is_schema_error() {
        let (_dir, path) = write_csv("label,a\n0,abc\n");
        let err = load_csv(&path, &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::Schema { line: 2, .. }));
    }

    #[test]
    fn non_integer_label_is_schema_error() {
        let (_dir, path) = write_csv("label,a\nseven,1.0\n");
        let err = load_csv(&path, &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::Schema { .. }));
    }

    #[test]
    fn missing_named_label_column_is_rejected() {
        let (_dir, path) = write_csv("a,b\n1,2\n");
        let options = CsvOptions {
            label_column: LabelColumn::Named("label".into()),
            has_headers: true,
        };
        let err = load_csv(&path, &options).unwrap_err();
        assert!(matches!(err, DatasetError::MissingLabelColumn(_)));
    }

    #[test]
    fn inconsistent_row_length_is_rejected() {
        let (_dir, path) = write_csv("label,a,b\n0,1.0,2.0\n1,3.0\n");
        let err = load_csv(&path, &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::Csv(_)));
    }

    #[test]
    fn split_generates_partitions() {
        let samples = (0..10)
            .map(|index| Sample {
                features: vec![index as f32, 0.0],
                label: u32::from(index % 2 == 0),
            })
            .collect();
        let dataset = Dataset { samples };
        let (train, test) = train_test_split(&dataset, 0.2);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(test.samples[0], dataset.samples[8]);
    }
}
