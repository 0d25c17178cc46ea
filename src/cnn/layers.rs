use ndarray::{s, Array1, Array2, Array4};

/// A fixed-shape network layer evaluated one time frame at a time.
///
/// Frames are flat slices laid out feature-major, filter-minor:
/// `frame[feature * num_filters + filter]`.
pub trait Layer: Send {
    fn name(&self) -> &'static str;

    fn in_size(&self) -> usize;

    fn out_size(&self) -> usize;

    /// Forget every past frame.
    fn reset(&mut self);

    /// Consume one input frame and write the output frame for the current time step.
    fn forward(&mut self, input: &[f32], output: &mut [f32]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Valid,
    Same,
}

/// Shape of a 2D convolution that streams over time and convolves over frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dShape {
    pub filters_in: usize,
    pub filters_out: usize,
    pub features_in: usize,
    pub kernel_time: usize,
    pub kernel_feature: usize,
    pub dilation: usize,
    pub stride: usize,
    pub padding: Padding,
}

impl Conv2dShape {
    pub const fn features_out(&self) -> usize {
        match self.padding {
            Padding::Valid => (self.features_in - self.kernel_feature) / self.stride + 1,
            Padding::Same => (self.features_in + self.stride - 1) / self.stride,
        }
    }

    pub const fn in_size(&self) -> usize {
        self.filters_in * self.features_in
    }

    pub const fn out_size(&self) -> usize {
        self.filters_out * self.features_out()
    }

    /// Number of past frames (current one included) that contribute to an output frame.
    pub const fn receptive_field(&self) -> usize {
        1 + (self.kernel_time - 1) * self.dilation
    }

    /// Future frames a centred (non-causal) version of this layer would read.
    pub const fn lookahead(&self) -> usize {
        (self.receptive_field() - 1) / 2
    }

    /// Zero padding added before the first feature, TensorFlow style.
    pub const fn pad_left(&self) -> usize {
        match self.padding {
            Padding::Valid => 0,
            Padding::Same => {
                let needed = (self.features_out() - 1) * self.stride + self.kernel_feature;
                if needed > self.features_in {
                    (needed - self.features_in) / 2
                } else {
                    0
                }
            }
        }
    }
}

/// Streaming 2D convolution.
///
/// Each time tap of the kernel is applied to the incoming frame once, and its contribution is
/// accumulated into the partial sum of the output step it belongs to. Partial sums live in a ring
/// of `receptive_field` slots; the slot of the current step is complete once the newest tap
/// has been added.
pub struct Conv2d {
    shape: Conv2dShape,
    // (time, feature, filter in, filter out)
    kernel: Array4<f32>,
    bias: Array1<f32>,
    // (slot, out frame)
    state: Array2<f32>,
    state_index: usize,
}

impl Conv2d {
    /// # Panics
    ///
    /// If `kernel` or `bias` do not have the dimensions implied by `shape`.
    pub fn new(shape: Conv2dShape, kernel: Array4<f32>, bias: Array1<f32>) -> Self {
        assert_eq!(
            kernel.dim(),
            (
                shape.kernel_time,
                shape.kernel_feature,
                shape.filters_in,
                shape.filters_out
            )
        );
        assert_eq!(bias.len(), shape.filters_out);

        Self {
            shape,
            kernel,
            bias,
            state: Array2::zeros((shape.receptive_field(), shape.out_size())),
            state_index: 0,
        }
    }

    fn accumulate_tap(&mut self, tap: usize, slot: usize, input: &[f32]) {
        let shape = self.shape;
        let pad_left = shape.pad_left();
        let filters_out = shape.filters_out;
        let mut acc = self.state.row_mut(slot);

        for feature_out in 0..shape.features_out() {
            let mut out = acc.slice_mut(s![feature_out * filters_out..(feature_out + 1) * filters_out]);

            for k in 0..shape.kernel_feature {
                let padded = feature_out * shape.stride + k;
                if padded < pad_left || padded - pad_left >= shape.features_in {
                    continue;
                }
                let feature_in = padded - pad_left;
                let x = &input[feature_in * shape.filters_in..(feature_in + 1) * shape.filters_in];
                let weights = self.kernel.slice(s![tap, k, .., ..]);

                for (&value, w_row) in x.iter().zip(weights.outer_iter()) {
                    if value == 0.0 {
                        continue;
                    }
                    out.zip_mut_with(&w_row, |o, &w| *o += value * w);
                }
            }
        }
    }
}

impl Layer for Conv2d {
    fn name(&self) -> &'static str {
        "conv2d"
    }

    fn in_size(&self) -> usize {
        self.shape.in_size()
    }

    fn out_size(&self) -> usize {
        self.shape.out_size()
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
        self.state_index = 0;
    }

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), self.in_size());
        debug_assert_eq!(output.len(), self.out_size());

        let receptive_field = self.shape.receptive_field();
        for tap in 0..self.shape.kernel_time {
            let delay = (self.shape.kernel_time - 1 - tap) * self.shape.dilation;
            let slot = (self.state_index + delay) % receptive_field;
            self.accumulate_tap(tap, slot, input);
        }

        let filters_out = self.shape.filters_out;
        let mut current = self.state.row_mut(self.state_index);
        for (i, (out, acc)) in output.iter_mut().zip(current.iter()).enumerate() {
            *out = acc + self.bias[i % filters_out];
        }
        current.fill(0.0);

        self.state_index = (self.state_index + 1) % receptive_field;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Relu,
    Sigmoid,
}

impl ActivationKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "relu" => Some(ActivationKind::Relu),
            "sigmoid" => Some(ActivationKind::Sigmoid),
            _ => None,
        }
    }

    pub fn apply(&self, x: f32) -> f32 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// Element-wise activation; stateless.
pub struct Activation {
    kind: ActivationKind,
    size: usize,
}

impl Activation {
    pub fn new(kind: ActivationKind, size: usize) -> Self {
        Self { kind, size }
    }
}

impl Layer for Activation {
    fn name(&self) -> &'static str {
        match self.kind {
            ActivationKind::Relu => "relu",
            ActivationKind::Sigmoid => "sigmoid",
        }
    }

    fn in_size(&self) -> usize {
        self.size
    }

    fn out_size(&self) -> usize {
        self.size
    }

    fn reset(&mut self) {}

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.kind.apply(x);
        }
    }
}
