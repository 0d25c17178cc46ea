//! Fixed shapes of the four convolutional stages.

use crate::constants::{
    NUM_FREQ_IN, NUM_FREQ_OUT, NUM_HARMONICS, ONSET_CONCAT_CHANNELS, ONSET_INPUT_CHANNELS,
};

use super::layers::{ActivationKind, Conv2dShape, Padding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSpec {
    Conv2d(Conv2dShape),
    Activation(ActivationKind),
}

#[derive(Debug, Clone, Copy)]
pub struct StageArchitecture {
    pub name: &'static str,
    pub layers: &'static [LayerSpec],
}

impl StageArchitecture {
    pub fn in_size(&self) -> usize {
        self.convolutions().next().map_or(0, |c| c.in_size())
    }

    pub fn out_size(&self) -> usize {
        self.convolutions().last().map_or(0, |c| c.out_size())
    }

    /// Sum of the lookahead of every convolution in the stage.
    pub fn lookahead(&self) -> usize {
        self.convolutions().map(|c| c.lookahead()).sum()
    }

    fn convolutions(&self) -> impl Iterator<Item = &Conv2dShape> {
        self.layers.iter().filter_map(|layer| match layer {
            LayerSpec::Conv2d(shape) => Some(shape),
            LayerSpec::Activation(_) => None,
        })
    }
}

const fn same(
    filters_in: usize,
    filters_out: usize,
    features_in: usize,
    kernel_time: usize,
    kernel_feature: usize,
    stride: usize,
) -> LayerSpec {
    LayerSpec::Conv2d(Conv2dShape {
        filters_in,
        filters_out,
        features_in,
        kernel_time,
        kernel_feature,
        dilation: 1,
        stride,
        padding: Padding::Same,
    })
}

const RELU: LayerSpec = LayerSpec::Activation(ActivationKind::Relu);
const SIGMOID: LayerSpec = LayerSpec::Activation(ActivationKind::Sigmoid);

/// Harmonic stack -> contour posteriorgram (264 bins).
pub const CONTOUR: StageArchitecture = StageArchitecture {
    name: "contour",
    layers: &[
        same(NUM_HARMONICS, 8, NUM_FREQ_IN, 3, 39, 1),
        RELU,
        same(8, 1, NUM_FREQ_IN, 5, 5, 1),
        SIGMOID,
    ],
};

/// Contour posteriorgram -> note posteriorgram (88 keys).
pub const NOTE: StageArchitecture = StageArchitecture {
    name: "note",
    layers: &[
        same(1, 32, NUM_FREQ_IN, 7, 7, 3),
        RELU,
        same(32, 1, NUM_FREQ_OUT, 7, 3, 1),
        SIGMOID,
    ],
};

/// Harmonic stack -> 32 onset channels per key.
pub const ONSET_INPUT: StageArchitecture = StageArchitecture {
    name: "onset input",
    layers: &[
        same(NUM_HARMONICS, ONSET_INPUT_CHANNELS, NUM_FREQ_IN, 5, 5, 3),
        RELU,
    ],
};

/// Note posteriorgram concatenated with onset channels -> onset posteriorgram.
pub const ONSET_OUTPUT: StageArchitecture = StageArchitecture {
    name: "onset output",
    layers: &[
        same(ONSET_CONCAT_CHANNELS, 1, NUM_FREQ_OUT, 3, 3, 1),
        SIGMOID,
    ],
};
