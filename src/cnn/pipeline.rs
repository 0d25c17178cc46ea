use ndarray::{s, Array2, ArrayView1};

use crate::constants::{
    FEATURE_FRAME_SIZE, NUM_FREQ_IN, NUM_FREQ_OUT, ONSET_CONCAT_CHANNELS, ONSET_INPUT_CHANNELS,
};
use crate::error::Result;

use super::architecture::{StageArchitecture, CONTOUR, NOTE, ONSET_INPUT, ONSET_OUTPUT};
use super::model::Sequential;

/// Return in-range index for given size as if periodic. Negative indices wrap from the end.
pub fn wrap_index(index: isize, size: usize) -> usize {
    index.rem_euclid(size as isize) as usize
}

/// Fixed-capacity circular store of stage outputs, one row per time step.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Array2<f32>,
    index: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            slots: Array2::zeros((capacity, width)),
            index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.nrows()
    }

    pub fn write(&mut self, values: &[f32]) {
        let mut slot = self.slots.row_mut(self.index);
        slot.iter_mut().zip(values).for_each(|(dst, &v)| *dst = v);
    }

    /// Slot written `capacity - 1` steps ago, i.e. the next one to be overwritten.
    pub fn oldest(&self) -> ArrayView1<f32> {
        self.slots.row(self.oldest_index())
    }

    fn oldest_index(&self) -> usize {
        wrap_index(self.index as isize + 1, self.capacity())
    }

    pub fn advance(&mut self) {
        self.index = self.oldest_index();
    }

    pub fn reset(&mut self) {
        self.slots.fill(0.0);
        self.index = 0;
    }
}

/// Per-stage lookahead and the ring capacities derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookahead {
    pub contour: usize,
    pub note: usize,
    pub onset_input: usize,
    pub onset_output: usize,
}

impl Lookahead {
    pub fn from_stages() -> Self {
        Self {
            contour: CONTOUR.lookahead(),
            note: NOTE.lookahead(),
            onset_input: ONSET_INPUT.lookahead(),
            onset_output: ONSET_OUTPUT.lookahead(),
        }
    }

    /// Delay between an input frame and its aligned outputs.
    pub fn total(&self) -> usize {
        self.contour + self.note + self.onset_output
    }

    pub fn contour_capacity(&self) -> usize {
        self.total() - self.contour + 1
    }

    pub fn note_capacity(&self) -> usize {
        self.total() - (self.contour + self.note) + 1
    }

    /// Onset input runs on the raw features like the contour stage, so it has to wait for
    /// contour and note to catch up before being concatenated with the note output.
    pub fn onset_input_capacity(&self) -> usize {
        self.contour + self.note - self.onset_input + 1
    }
}

/// One output step of the pipeline. All three rows describe the same input frame.
#[derive(Debug, Clone, Copy)]
pub struct AlignedFrame<'a> {
    pub contour: ArrayView1<'a, f32>,
    pub note: ArrayView1<'a, f32>,
    pub onset: &'a [f32],
}

/// The four convolutional stages, run frame by frame with ring buffers re-aligning their outputs.
pub struct StagePipeline {
    contour: Sequential,
    note: Sequential,
    onset_input: Sequential,
    onset_output: Sequential,

    lookahead: Lookahead,

    input: Vec<f32>,
    concat: Vec<f32>,

    contour_ring: RingBuffer,
    note_ring: RingBuffer,
    onset_input_ring: RingBuffer,
}

impl StagePipeline {
    /// Load the four stages from their JSON weights.
    pub fn from_json(contour: &[u8], note: &[u8], onset_input: &[u8], onset_output: &[u8]) -> Result<Self> {
        Ok(Self::new(
            Sequential::from_json(contour, &CONTOUR)?,
            Sequential::from_json(note, &NOTE)?,
            Sequential::from_json(onset_input, &ONSET_INPUT)?,
            Sequential::from_json(onset_output, &ONSET_OUTPUT)?,
        ))
    }

    /// # Panics
    ///
    /// If a stage does not have the input/output sizes of its architecture.
    pub fn new(contour: Sequential, note: Sequential, onset_input: Sequential, onset_output: Sequential) -> Self {
        check_sizes(&contour, &CONTOUR);
        check_sizes(&note, &NOTE);
        check_sizes(&onset_input, &ONSET_INPUT);
        check_sizes(&onset_output, &ONSET_OUTPUT);

        let lookahead = Lookahead::from_stages();

        Self {
            contour,
            note,
            onset_input,
            onset_output,
            lookahead,
            input: vec![0.0; FEATURE_FRAME_SIZE],
            concat: vec![0.0; ONSET_CONCAT_CHANNELS * NUM_FREQ_OUT],
            contour_ring: RingBuffer::new(lookahead.contour_capacity(), NUM_FREQ_IN),
            note_ring: RingBuffer::new(lookahead.note_capacity(), NUM_FREQ_OUT),
            onset_input_ring: RingBuffer::new(
                lookahead.onset_input_capacity(),
                ONSET_INPUT_CHANNELS * NUM_FREQ_OUT,
            ),
        }
    }

    /// Number of frames between feeding a frame and reading its aligned outputs.
    pub fn lookahead_frames(&self) -> usize {
        self.lookahead.total()
    }

    pub fn lookahead(&self) -> &Lookahead {
        &self.lookahead
    }

    pub fn reset(&mut self) {
        self.contour.reset();
        self.note.reset();
        self.onset_input.reset();
        self.onset_output.reset();

        self.contour_ring.reset();
        self.note_ring.reset();
        self.onset_input_ring.reset();

        self.input.fill(0.0);
        self.concat.fill(0.0);
    }

    /// Run inference for a single feature frame (`NUM_HARMONICS * NUM_FREQ_IN` values).
    ///
    /// The returned rows belong to the frame fed `lookahead_frames()` calls earlier.
    pub fn advance(&mut self, features: ArrayView1<f32>) -> AlignedFrame<'_> {
        assert_eq!(features.len(), FEATURE_FRAME_SIZE);
        self.input
            .iter_mut()
            .zip(features.iter())
            .for_each(|(dst, &v)| *dst = v);

        self.run_models();

        self.contour_ring.advance();
        self.note_ring.advance();
        self.onset_input_ring.advance();

        // After advancing, the current slot of each ring is the one that was oldest.
        AlignedFrame {
            contour: self.contour_ring.slots.row(self.contour_ring.index),
            note: self.note_ring.slots.row(self.note_ring.index),
            onset: self.onset_output.output(),
        }
    }

    fn run_models(&mut self) {
        let onsets = self.onset_input.forward(&self.input);
        self.onset_input_ring.write(onsets);

        let contours = self.contour.forward(&self.input);
        self.contour_ring.write(contours);

        let notes = self.note.forward(contours);
        self.note_ring.write(notes);

        self.concat();
        self.onset_output.forward(&self.concat);
    }

    /// Interleave the current note output with the onset channels that were computed for the
    /// same input frame.
    fn concat(&mut self) {
        let notes = self.note.output();
        let onset_channels = self.onset_input_ring.oldest();

        for (i, row) in self.concat.chunks_exact_mut(ONSET_CONCAT_CHANNELS).enumerate() {
            row[0] = notes[i];
            let channels = onset_channels.slice(s![i * ONSET_INPUT_CHANNELS..(i + 1) * ONSET_INPUT_CHANNELS]);
            row[1..]
                .iter_mut()
                .zip(channels.iter())
                .for_each(|(dst, &v)| *dst = v);
        }
    }
}

fn check_sizes(model: &Sequential, architecture: &StageArchitecture) {
    assert_eq!(model.in_size(), architecture.in_size(), "{} input size", architecture.name);
    assert_eq!(model.out_size(), architecture.out_size(), "{} output size", architecture.name);
}
