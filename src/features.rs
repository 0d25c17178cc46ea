use ndarray::{Array2, Axis};
use ort::{GraphOptimizationLevel, Session, Tensor};

use crate::constants::{FEATURE_FRAME_SIZE, NUM_FREQ_IN, NUM_HARMONICS};
use crate::error::{Error, Result};

/// Turns raw audio into harmonically stacked spectral frames.
pub trait FeatureExtractor {
    /// Compute features for the full signal.
    ///
    /// Returns one row of `NUM_FREQ_IN * NUM_HARMONICS` values per hop, laid out
    /// frequency-major with harmonics innermost.
    fn compute_features(&mut self, audio: &[f32]) -> Result<Array2<f32>>;
}

const INPUT_NAME: &str = "input_1";
const OUTPUT_NAME: &str = "harmonic_stacking";

/// Feature extractor backed by an ONNX Runtime session.
pub struct OnnxFeatureExtractor {
    session: Session,
}

impl OnnxFeatureExtractor {
    pub fn from_memory(model: &[u8]) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .with_inter_threads(1)?
            .commit_from_memory(model)?;

        log::debug!("Loaded feature model ({} bytes)", model.len());
        Ok(Self { session })
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn compute_features(&mut self, audio: &[f32]) -> Result<Array2<f32>> {
        if audio.is_empty() {
            return Ok(Array2::zeros((0, FEATURE_FRAME_SIZE)));
        }

        let input_shape = vec![1, audio.len() as i64, 1];
        let input_tensor = Tensor::from_array((input_shape, audio.to_vec()))?;
        let outputs = self.session.run(ort::inputs![INPUT_NAME => input_tensor]?)?;

        let stacked = outputs[OUTPUT_NAME].try_extract_tensor::<f32>()?;
        let shape = stacked.shape().to_vec();
        if shape.len() != 4 || shape[0] != 1 || shape[2] != NUM_FREQ_IN || shape[3] != NUM_HARMONICS {
            return Err(Error::FeatureShape(shape));
        }

        let num_frames = shape[1];
        let frames = stacked.index_axis(Axis(0), 0);
        let features = Array2::from_shape_vec((num_frames, FEATURE_FRAME_SIZE), frames.iter().copied().collect())?;

        log::debug!("Computed {} feature frames from {} samples", num_frames, audio.len());
        Ok(features)
    }
}
