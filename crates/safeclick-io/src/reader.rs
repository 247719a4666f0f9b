//! CSV dataset reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::domain::{Dataset, SampleId};
use crate::schema::FeatureSchema;
use crate::IoError;

/// Default name of the label column.
pub const DEFAULT_LABEL_COLUMN: &str = "CLASS_LABEL";

/// Reads a labelled or unlabelled feature matrix from a CSV file.
///
/// Expected CSV format:
/// - Header row required, naming every column
/// - Feature columns hold finite numbers
/// - The label column (if present) holds `0` or `1`
/// - All rows have the same number of columns as the header
///
/// Without a schema, every column other than the label and id columns is a
/// feature, in header order. With a schema, exactly the schema's columns are
/// read, in schema order, and any other column is ignored.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateColumn`] | Header names a column twice |
/// | [`IoError::MissingFeatureColumn`] | Schema or id column absent from the header |
/// | [`IoError::NoFeatureColumns`] | No feature columns to read |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable |
/// | [`IoError::InvalidLabel`] | Label cell is not `0` or `1` |
#[derive(Debug, Clone)]
pub struct DatasetReader {
    path: PathBuf,
    label_column: String,
    id_column: Option<String>,
    schema: Option<FeatureSchema>,
}

/// Header positions resolved against the reader's configuration.
struct ColumnLayout {
    n_columns: usize,
    feature_names: Vec<String>,
    feature_positions: Vec<usize>,
    label_position: Option<usize>,
    id_position: Option<usize>,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            id_column: None,
            schema: None,
        }
    }

    /// Set the name of the label column.
    #[must_use]
    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }

    /// Take sample IDs from the named column instead of row indices.
    #[must_use]
    pub fn with_id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = Some(name.into());
        self
    }

    /// Read exactly these feature columns, in this order.
    #[must_use]
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Read and validate the CSV file, returning a [`Dataset`].
    ///
    /// Labels are `None` when the file has no label column.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that short rows surface as InconsistentRowLength
        // rather than a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let header: Vec<String> = header.iter().map(String::from).collect();
        let layout = self.resolve_columns(&header)?;
        debug!(
            n_columns = layout.n_columns,
            n_features = layout.feature_names.len(),
            labelled = layout.label_position.is_some(),
            "read CSV header"
        );

        let mut ids = Vec::new();
        let mut features = Vec::new();
        let mut labels = layout.label_position.map(|_| Vec::new());

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            let id = match layout.id_position {
                Some(pos) => record.get(pos).unwrap_or("").to_string(),
                None => row_index.to_string(),
            };

            if record.len() != layout.n_columns {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    id,
                    expected: layout.n_columns,
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(layout.feature_positions.len());
            for (&pos, name) in layout.feature_positions.iter().zip(&layout.feature_names) {
                let raw = record.get(pos).unwrap_or("");
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => row.push(value),
                    _ => {
                        return Err(IoError::NonFiniteValue {
                            path: self.path.clone(),
                            row_index,
                            column: name.clone(),
                            raw: raw.to_string(),
                        });
                    }
                }
            }

            if let (Some(pos), Some(labels)) = (layout.label_position, labels.as_mut()) {
                let raw = record.get(pos).unwrap_or("");
                let label = match raw.trim() {
                    "0" => 0,
                    "1" => 1,
                    _ => {
                        return Err(IoError::InvalidLabel {
                            path: self.path.clone(),
                            row_index,
                            raw: raw.to_string(),
                        });
                    }
                };
                labels.push(label);
            }

            ids.push(SampleId::new(id));
            features.push(row);
        }

        if features.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = features.len(),
            n_features = layout.feature_names.len(),
            labelled = labels.is_some(),
            "dataset loaded"
        );

        Ok(Dataset::new(ids, layout.feature_names, features, labels))
    }

    fn resolve_columns(&self, header: &[String]) -> Result<ColumnLayout, IoError> {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(header.len());
        for (i, name) in header.iter().enumerate() {
            if positions.insert(name.as_str(), i).is_some() {
                return Err(IoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: name.clone(),
                });
            }
        }

        let label_position = positions.get(self.label_column.as_str()).copied();
        let id_position = match &self.id_column {
            Some(column) => Some(positions.get(column.as_str()).copied().ok_or_else(|| {
                IoError::MissingFeatureColumn {
                    path: self.path.clone(),
                    column: column.clone(),
                }
            })?),
            None => None,
        };

        let (feature_names, feature_positions): (Vec<String>, Vec<usize>) = match &self.schema {
            Some(schema) => {
                let mut names = Vec::with_capacity(schema.len());
                let mut found = Vec::with_capacity(schema.len());
                for column in schema.columns() {
                    let pos = positions.get(column.as_str()).copied().ok_or_else(|| {
                        IoError::MissingFeatureColumn {
                            path: self.path.clone(),
                            column: column.clone(),
                        }
                    })?;
                    names.push(column.clone());
                    found.push(pos);
                }
                (names, found)
            }
            None => header
                .iter()
                .enumerate()
                .filter(|&(i, _)| Some(i) != label_position && Some(i) != id_position)
                .map(|(i, name)| (name.clone(), i))
                .unzip(),
        };

        if feature_names.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        Ok(ColumnLayout {
            n_columns: header.len(),
            feature_names,
            feature_positions,
            label_position,
            id_position,
        })
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
