//! CSV datasets, feature schemas, and JSON result artifacts for safeclick.

mod domain;
mod error;
mod reader;
mod schema;
mod writer;

pub use domain::{Dataset, ExperimentName, SampleId};
pub use error::IoError;
pub use reader::{DEFAULT_LABEL_COLUMN, DatasetReader};
pub use schema::FeatureSchema;
pub use writer::ResultWriter;
