use std::path::PathBuf;

/// Errors from dataset loading, validation, and artifact writing.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// File does not exist or cannot be opened.
    #[error("file not found: {path}")]
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The CSV parser rejected a record.
    #[error("CSV parse error in {path} at byte {offset}")]
    CsvParse {
        path: PathBuf,
        offset: u64,
        source: csv::Error,
    },

    /// The file has a header but zero data rows.
    #[error("empty dataset: {path}")]
    EmptyDataset { path: PathBuf },

    /// A row has a different number of columns than the header.
    #[error("{path}: row {row_index} ({id}) has {got} columns, expected {expected}")]
    InconsistentRowLength {
        path: PathBuf,
        row_index: usize,
        id: String,
        expected: usize,
        got: usize,
    },

    /// A feature cell is NaN, infinite, or not a number.
    #[error("{path}: row {row_index}, column {column}: non-finite value {raw:?}")]
    NonFiniteValue {
        path: PathBuf,
        row_index: usize,
        column: String,
        raw: String,
    },

    /// A label cell is not `0` or `1`.
    #[error("{path}: row {row_index}: label {raw:?} is not 0 or 1")]
    InvalidLabel {
        path: PathBuf,
        row_index: usize,
        raw: String,
    },

    /// The header names no feature columns.
    #[error("{path}: no feature columns")]
    NoFeatureColumns { path: PathBuf },

    /// A column required by the schema is absent from the header.
    #[error("{path}: missing feature column {column:?}")]
    MissingFeatureColumn { path: PathBuf, column: String },

    /// The header names the same column twice.
    #[error("{path}: duplicate column {column:?}")]
    DuplicateColumn { path: PathBuf, column: String },

    /// Experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name {name:?}: must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName { name: String },

    /// The output directory could not be created.
    #[error("failed to create output directory {path}")]
    OutputDirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An artifact file could not be written.
    #[error("failed to write {path}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}
