#![allow(dead_code)]

use ndarray::{Array1, Array2, Array4};
use serde_json::{json, Value};

use basic_pitch_streaming::cnn::architecture::{LayerSpec, StageArchitecture, CONTOUR, NOTE, ONSET_INPUT, ONSET_OUTPUT};
use basic_pitch_streaming::cnn::layers::{Activation, Conv2d, Layer};
use basic_pitch_streaming::cnn::model::Sequential;
use basic_pitch_streaming::cnn::pipeline::StagePipeline;
use basic_pitch_streaming::constants::{FEATURE_FRAME_SIZE, FFT_HOP, NUM_HARMONICS};
use basic_pitch_streaming::{FeatureExtractor, Result};

/// (time tap, feature tap, filter in, filter out, weight)
pub type Tap = (usize, usize, usize, usize, f32);

/// Non-zero kernel entries and the bias of one conv layer.
pub struct ConvWeights {
    pub taps: &'static [Tap],
    pub bias: f32,
}

// Every stage reads a single centred tap, so each conv layer delays its input by exactly its
// lookahead. A weight of 20 with a bias of -10 maps 0 to ~0 and 1 to ~1 through a sigmoid.
//
// Contour bin `b` follows harmonic 0 of bin `b`; note `n` follows contour bin `3n`; onset `n`
// follows harmonic 1 of bin `3n`.
pub const CONTOUR_WEIGHTS: [ConvWeights; 2] = [
    ConvWeights { taps: &[(1, 19, 0, 0, 1.0)], bias: 0.0 },
    ConvWeights { taps: &[(2, 2, 0, 0, 20.0)], bias: -10.0 },
];
pub const NOTE_WEIGHTS: [ConvWeights; 2] = [
    ConvWeights { taps: &[(3, 2, 0, 0, 1.0)], bias: 0.0 },
    ConvWeights { taps: &[(3, 1, 0, 0, 20.0)], bias: -10.0 },
];
pub const ONSET_INPUT_WEIGHTS: [ConvWeights; 1] = [ConvWeights { taps: &[(2, 1, 1, 0, 1.0)], bias: 0.0 }];
pub const ONSET_OUTPUT_WEIGHTS: [ConvWeights; 1] = [ConvWeights { taps: &[(1, 1, 1, 0, 20.0)], bias: -10.0 }];

fn kernel(layer: &LayerSpec, weights: &ConvWeights) -> Array4<f32> {
    let LayerSpec::Conv2d(shape) = layer else {
        panic!("not a conv layer");
    };
    let mut kernel = Array4::zeros((shape.kernel_time, shape.kernel_feature, shape.filters_in, shape.filters_out));
    for &(time, feature, filter_in, filter_out, weight) in weights.taps {
        kernel[[time, feature, filter_in, filter_out]] = weight;
    }
    kernel
}

pub fn build_stage(architecture: &StageArchitecture, weights: &[ConvWeights]) -> Sequential {
    let mut weights = weights.iter();
    let mut size = architecture.in_size();
    let layers = architecture
        .layers
        .iter()
        .map(|layer| -> Box<dyn Layer> {
            match layer {
                LayerSpec::Conv2d(shape) => {
                    let conv_weights = weights.next().expect("weights for every conv layer");
                    size = shape.out_size();
                    Box::new(Conv2d::new(
                        *shape,
                        kernel(layer, conv_weights),
                        Array1::from_elem(shape.filters_out, conv_weights.bias),
                    ))
                }
                LayerSpec::Activation(kind) => Box::new(Activation::new(*kind, size)),
            }
        })
        .collect();
    Sequential::new(layers)
}

pub fn synthetic_pipeline() -> StagePipeline {
    StagePipeline::new(
        build_stage(&CONTOUR, &CONTOUR_WEIGHTS),
        build_stage(&NOTE, &NOTE_WEIGHTS),
        build_stage(&ONSET_INPUT, &ONSET_INPUT_WEIGHTS),
        build_stage(&ONSET_OUTPUT, &ONSET_OUTPUT_WEIGHTS),
    )
}

/// The same weights in the JSON weight format, activations inlined on their conv layer.
pub fn stage_json(architecture: &StageArchitecture, weights: &[ConvWeights]) -> Vec<u8> {
    let mut weights = weights.iter();
    let mut layers: Vec<Value> = vec![];
    for layer in architecture.layers {
        match layer {
            LayerSpec::Conv2d(shape) => {
                let conv_weights = weights.next().expect("weights for every conv layer");
                let kernel = kernel(layer, conv_weights);
                let nested: Vec<Vec<Vec<Vec<f32>>>> = kernel
                    .outer_iter()
                    .map(|time| {
                        time.outer_iter()
                            .map(|feature| feature.outer_iter().map(|filter| filter.to_vec()).collect())
                            .collect()
                    })
                    .collect();
                layers.push(json!({
                    "type": "conv2d",
                    "weights": [nested, vec![conv_weights.bias; shape.filters_out]],
                    "strides": shape.stride,
                    "padding": "same",
                }));
            }
            LayerSpec::Activation(kind) => {
                let name = format!("{kind:?}").to_lowercase();
                let previous = layers.last_mut().expect("activation follows a conv layer");
                previous["activation"] = json!(name);
            }
        }
    }
    serde_json::to_vec(&json!({ "layers": layers })).expect("serializable weights")
}

pub fn synthetic_pipeline_from_json() -> Result<StagePipeline> {
    StagePipeline::from_json(
        &stage_json(&CONTOUR, &CONTOUR_WEIGHTS),
        &stage_json(&NOTE, &NOTE_WEIGHTS),
        &stage_json(&ONSET_INPUT, &ONSET_INPUT_WEIGHTS),
        &stage_json(&ONSET_OUTPUT, &ONSET_OUTPUT_WEIGHTS),
    )
}

/// Features with single spikes: harmonic 0 of each `(frame, bin)`.
pub fn spikes(num_frames: usize, spikes: &[(usize, usize)]) -> Array2<f32> {
    harmonic_spikes(num_frames, 0, spikes)
}

/// Features with single spikes on one harmonic of each `(frame, bin)`.
pub fn harmonic_spikes(num_frames: usize, harmonic: usize, spikes: &[(usize, usize)]) -> Array2<f32> {
    let mut features = Array2::zeros((num_frames, FEATURE_FRAME_SIZE));
    for &(frame, bin) in spikes {
        features[[frame, bin * NUM_HARMONICS + harmonic]] = 1.0;
    }
    features
}

/// Stand-in feature extractor: the first sample of every hop is the level of one frequency bin,
/// and level rises are written to harmonic 1 so they show up as onsets.
pub struct LevelFeatures {
    pub bin: usize,
}

impl FeatureExtractor for LevelFeatures {
    fn compute_features(&mut self, audio: &[f32]) -> Result<Array2<f32>> {
        let num_frames = audio.len() / FFT_HOP;
        let mut features = Array2::zeros((num_frames, FEATURE_FRAME_SIZE));
        let mut previous = 0.0f32;
        for frame in 0..num_frames {
            let level = audio[frame * FFT_HOP];
            features[[frame, self.bin * NUM_HARMONICS]] = level;
            features[[frame, self.bin * NUM_HARMONICS + 1]] = (level - previous).max(0.0);
            previous = level;
        }
        Ok(features)
    }
}

/// Audio held at 1.0 over `frames` hops and silent elsewhere.
pub fn held_level(num_frames: usize, frames: std::ops::Range<usize>) -> Vec<f32> {
    let mut audio = vec![0.0; num_frames * FFT_HOP];
    audio[frames.start * FFT_HOP..frames.end * FFT_HOP].fill(1.0);
    audio
}
