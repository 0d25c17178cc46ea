use ndarray::{Array1, Array2, ArrayView2};

use crate::cnn::pipeline::StagePipeline;
use crate::constants::{FEATURE_FRAME_SIZE, NUM_FREQ_IN, NUM_FREQ_OUT};

/// Aligned model outputs: row `k` of every matrix belongs to input frame `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Posteriorgrams {
    /// (n_frames, 264)
    pub contours: Array2<f32>,
    /// (n_frames, 88)
    pub notes: Array2<f32>,
    /// (n_frames, 88)
    pub onsets: Array2<f32>,
}

impl Posteriorgrams {
    pub fn zeros(num_frames: usize) -> Self {
        Self {
            contours: Array2::zeros((num_frames, NUM_FREQ_IN)),
            notes: Array2::zeros((num_frames, NUM_FREQ_OUT)),
            onsets: Array2::zeros((num_frames, NUM_FREQ_OUT)),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.notes.nrows()
    }
}

impl Default for Posteriorgrams {
    fn default() -> Self {
        Self::zeros(0)
    }
}

/// Run the stage pipeline over a whole feature sequence.
///
/// The pipeline is reset, warmed up with `L = lookahead_frames()` zero frames, fed every real
/// frame and drained with `L` more zero frames. Outputs of the first `2L` steps precede frame 0
/// and are discarded, so step `s` yields row `s - 2L` and exactly `features.nrows()` rows come out.
pub fn run_inference(pipeline: &mut StagePipeline, features: ArrayView2<f32>) -> Posteriorgrams {
    assert_eq!(features.ncols(), FEATURE_FRAME_SIZE);

    let num_frames = features.nrows();
    let lookahead = pipeline.lookahead_frames();
    let mut posteriorgrams = Posteriorgrams::zeros(num_frames);

    pipeline.reset();

    let zeros = Array1::<f32>::zeros(FEATURE_FRAME_SIZE);
    for step in 0..num_frames + 2 * lookahead {
        let input = match step.checked_sub(lookahead) {
            Some(frame_idx) if frame_idx < num_frames => features.row(frame_idx),
            _ => zeros.view(),
        };

        let aligned = pipeline.advance(input);

        let Some(row) = step.checked_sub(2 * lookahead) else {
            continue;
        };
        posteriorgrams.contours.row_mut(row).assign(&aligned.contour);
        posteriorgrams.notes.row_mut(row).assign(&aligned.note);
        posteriorgrams
            .onsets
            .row_mut(row)
            .iter_mut()
            .zip(aligned.onset)
            .for_each(|(dst, &v)| *dst = v);
    }

    log::debug!("Inferred posteriorgrams for {} frames (lookahead {})", num_frames, lookahead);
    posteriorgrams
}
