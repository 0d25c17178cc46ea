use ndarray::{Array1, Array4};
use serde::Deserialize;

use crate::error::{Error, Result};

use super::architecture::{LayerSpec, StageArchitecture};
use super::layers::{Activation, ActivationKind, Conv2d, Conv2dShape, Layer, Padding};

/// A feed-forward chain of layers with owned intermediate buffers.
pub struct Sequential {
    layers: Vec<Box<dyn Layer>>,
    buffers: Vec<Vec<f32>>,
}

impl Sequential {
    /// # Panics
    ///
    /// If `layers` is empty or consecutive layer sizes disagree.
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Self {
        assert!(!layers.is_empty(), "a model needs at least one layer");
        for pair in layers.windows(2) {
            assert_eq!(
                pair[0].out_size(),
                pair[1].in_size(),
                "{} output does not feed {}",
                pair[0].name(),
                pair[1].name()
            );
        }

        let buffers = layers.iter().map(|layer| vec![0.0; layer.out_size()]).collect();
        Self { layers, buffers }
    }

    /// Build a model from its JSON weights, checking every layer against `architecture`.
    pub fn from_json(json: &[u8], architecture: &StageArchitecture) -> Result<Self> {
        let model: ModelJson = serde_json::from_slice(json)?;
        let layers = build_layers(model, architecture)?;
        log::debug!(
            "Loaded {} model: {} layers, lookahead {}",
            architecture.name,
            layers.len(),
            architecture.lookahead()
        );
        Ok(Self::new(layers))
    }

    pub fn in_size(&self) -> usize {
        self.layers[0].in_size()
    }

    pub fn out_size(&self) -> usize {
        self.layers[self.layers.len() - 1].out_size()
    }

    pub fn reset(&mut self) {
        for layer in self.layers.iter_mut() {
            layer.reset();
        }
        for buffer in self.buffers.iter_mut() {
            buffer.fill(0.0);
        }
    }

    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        assert_eq!(input.len(), self.in_size());

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let (done, rest) = self.buffers.split_at_mut(i);
            let src: &[f32] = if i == 0 { input } else { &done[i - 1] };
            layer.forward(src, &mut rest[0]);
        }

        self.output()
    }

    /// Output of the latest `forward` call.
    pub fn output(&self) -> &[f32] {
        &self.buffers[self.buffers.len() - 1]
    }
}

#[derive(Debug, Deserialize)]
struct ModelJson {
    layers: Vec<LayerJson>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LayerJson {
    Conv2d(Conv2dJson),
    Activation { activation: String },
}

type KernelJson = Vec<Vec<Vec<Vec<f32>>>>;

#[derive(Debug, Deserialize)]
struct Conv2dJson {
    #[serde(default)]
    activation: String,
    weights: (KernelJson, Vec<f32>),
    #[serde(default)]
    strides: Option<usize>,
    #[serde(default)]
    dilation: Option<usize>,
    #[serde(default)]
    padding: Option<String>,
}

enum ParsedLayer {
    Conv2d(Conv2dJson),
    Activation(ActivationKind),
}

fn parse_activation(stage: &'static str, name: &str) -> Result<Option<ActivationKind>> {
    match name {
        "" | "linear" => Ok(None),
        _ => ActivationKind::from_name(name)
            .map(Some)
            .ok_or_else(|| Error::model_shape(stage, format!("unsupported activation '{name}'"))),
    }
}

/// Flatten the JSON layer list, splitting activations declared inline on a conv layer.
fn flatten(stage: &'static str, model: ModelJson) -> Result<Vec<ParsedLayer>> {
    let mut parsed = vec![];
    for layer in model.layers {
        match layer {
            LayerJson::Conv2d(conv) => {
                let activation = parse_activation(stage, &conv.activation)?;
                parsed.push(ParsedLayer::Conv2d(conv));
                if let Some(kind) = activation {
                    parsed.push(ParsedLayer::Activation(kind));
                }
            }
            LayerJson::Activation { activation } => {
                if let Some(kind) = parse_activation(stage, &activation)? {
                    parsed.push(ParsedLayer::Activation(kind));
                }
            }
        }
    }
    Ok(parsed)
}

fn build_layers(model: ModelJson, architecture: &StageArchitecture) -> Result<Vec<Box<dyn Layer>>> {
    let stage = architecture.name;
    let parsed = flatten(stage, model)?;

    if parsed.len() != architecture.layers.len() {
        return Err(Error::model_shape(
            stage,
            format!("expected {} layers, found {}", architecture.layers.len(), parsed.len()),
        ));
    }

    let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(parsed.len());
    let mut size = architecture.in_size();

    for (index, (layer, spec)) in parsed.into_iter().zip(architecture.layers).enumerate() {
        match (layer, spec) {
            (ParsedLayer::Conv2d(json), LayerSpec::Conv2d(shape)) => {
                let conv = build_conv(stage, index, json, *shape)?;
                size = conv.out_size();
                layers.push(Box::new(conv));
            }
            (ParsedLayer::Activation(kind), LayerSpec::Activation(expected)) if kind == *expected => {
                layers.push(Box::new(Activation::new(kind, size)));
            }
            (_, expected) => {
                return Err(Error::model_shape(
                    stage,
                    format!("layer {index} does not match expected {expected:?}"),
                ));
            }
        }
    }

    Ok(layers)
}

fn build_conv(stage: &'static str, index: usize, json: Conv2dJson, shape: Conv2dShape) -> Result<Conv2d> {
    if json.strides.is_some_and(|s| s != shape.stride) {
        return Err(Error::model_shape(stage, format!("layer {index}: stride mismatch")));
    }
    if json.dilation.is_some_and(|d| d != shape.dilation) {
        return Err(Error::model_shape(stage, format!("layer {index}: dilation mismatch")));
    }
    if let Some(padding) = json.padding.as_deref() {
        let expected = match shape.padding {
            Padding::Same => "same",
            Padding::Valid => "valid",
        };
        if padding != expected {
            return Err(Error::model_shape(
                stage,
                format!("layer {index}: padding '{padding}', expected '{expected}'"),
            ));
        }
    }

    let (kernel_json, bias) = json.weights;
    let dims = (
        shape.kernel_time,
        shape.kernel_feature,
        shape.filters_in,
        shape.filters_out,
    );

    let mut flat = Vec::with_capacity(dims.0 * dims.1 * dims.2 * dims.3);
    let well_formed = kernel_json.len() == dims.0
        && kernel_json.iter().all(|time| {
            time.len() == dims.1
                && time.iter().all(|feature| {
                    feature.len() == dims.2 && feature.iter().all(|filter| filter.len() == dims.3)
                })
        });
    if !well_formed {
        return Err(Error::model_shape(
            stage,
            format!("layer {index}: kernel is not shaped {dims:?}"),
        ));
    }
    for time in kernel_json {
        for feature in time {
            for filter in feature {
                flat.extend(filter);
            }
        }
    }

    if bias.len() != shape.filters_out {
        return Err(Error::model_shape(
            stage,
            format!("layer {index}: bias has {} values, expected {}", bias.len(), shape.filters_out),
        ));
    }

    let kernel = Array4::from_shape_vec(dims, flat)?;
    Ok(Conv2d::new(shape, kernel, Array1::from(bias)))
}
