use thiserror::Error;

/// Errors raised while loading models, running feature extraction or reading/writing files.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ONNX runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("malformed model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{stage} model does not match its architecture: {reason}")]
    ModelShape { stage: &'static str, reason: String },

    #[error("unexpected feature tensor shape {0:?}")]
    FeatureShape(Vec<usize>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("cannot build resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("array shape error: {0}")]
    Array(#[from] ndarray::ShapeError),

    #[error("MIDI error: {0}")]
    Midi(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn model_shape(stage: &'static str, reason: impl Into<String>) -> Self {
        Error::ModelShape {
            stage,
            reason: reason.into(),
        }
    }
}
