//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::EnsembleError;
use crate::model::{Model, ModelKind};

/// Leading bytes of every model file.
const MAGIC: [u8; 4] = *b"SCLK";

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// File identifier.
    magic: [u8; 4],
    /// Format version for compatibility checking.
    format_version: u32,
    /// Estimator kind, duplicated from `model` for cheap inspection.
    kind: ModelKind,
    /// Number of trees in the model.
    n_estimators: usize,
    /// Number of features the model was trained on.
    n_features: usize,
    /// Feature column names.
    feature_names: Vec<String>,
    /// The serialized model.
    model: Model,
}

impl Model {
    /// Encode the model into a versioned bincode envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::SerializeModel`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnsembleError> {
        let envelope = ModelEnvelope {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            kind: self.kind(),
            n_estimators: self.n_estimators(),
            n_features: self.n_features(),
            feature_names: self.feature_names().to_vec(),
            model: self.clone(),
        };
        bincode::serialize(&envelope).map_err(|e| EnsembleError::SerializeModel { source: e })
    }

    /// Decode and validate a model produced by [`Model::to_bytes`].
    ///
    /// The header is checked before the body is decoded, so a file from
    /// another format version is reported as such rather than as garbage.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EnsembleError::DeserializeModel`] | bincode decoding failed |
    /// | [`EnsembleError::CorruptModel`] | wrong magic bytes, or an arena/metadata invariant is violated |
    /// | [`EnsembleError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`EnsembleError::FeatureIndexOutOfRange`] | a split or subset refers to a missing column |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnsembleError> {
        let (magic, format_version): ([u8; 4], u32) =
            bincode::deserialize(bytes).map_err(|e| EnsembleError::DeserializeModel { source: e })?;
        if magic != MAGIC {
            return Err(EnsembleError::CorruptModel {
                reason: "missing model file header".to_string(),
            });
        }
        if format_version != FORMAT_VERSION {
            return Err(EnsembleError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: format_version,
            });
        }

        let envelope: ModelEnvelope =
            bincode::deserialize(bytes).map_err(|e| EnsembleError::DeserializeModel { source: e })?;
        let model = envelope.model;

        if envelope.kind != model.kind()
            || envelope.n_estimators != model.n_estimators()
            || envelope.n_features != model.n_features()
            || envelope.feature_names != model.feature_names()
        {
            return Err(EnsembleError::CorruptModel {
                reason: "envelope metadata disagrees with the model body".to_string(),
            });
        }
        model.check_structure()?;

        debug!(
            kind = %envelope.kind,
            n_estimators = envelope.n_estimators,
            n_features = envelope.n_features,
            "model decoded"
        );
        Ok(model)
    }

    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EnsembleError::SerializeModel`] | bincode encoding failed |
    /// | [`EnsembleError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EnsembleError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        std::fs::write(path, &bytes).map_err(|e| EnsembleError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            kind = %self.kind(),
            n_estimators = self.n_estimators(),
            "model saved"
        );
        Ok(())
    }

    /// Load and validate a model from a binary file.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::ReadModel`] if the file cannot be read,
    /// otherwise the errors of [`Model::from_bytes`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnsembleError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| EnsembleError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = Self::from_bytes(&bytes)?;
        info!(
            kind = %model.kind(),
            n_estimators = model.n_estimators(),
            n_features = model.n_features(),
            "model loaded"
        );
        Ok(model)
    }
}
