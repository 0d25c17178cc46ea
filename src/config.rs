//! Note extraction parameters and model file locations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUDIO_SAMPLE_RATE, CONTOUR_MODEL_FILE, FEATURES_MODEL_FILE, FFT_HOP, NOTE_MODEL_FILE,
    ONSET_INPUT_MODEL_FILE, ONSET_OUTPUT_MODEL_FILE,
};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchBendMode {
    /// No pitch bends are estimated.
    #[default]
    None,
    /// One bend track per note; bends of notes overlapping in time are dropped.
    Single,
    /// Every note keeps its own bends.
    Multi,
}

/// Parameters of the posteriorgram to note event conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertParams {
    /// Note segmentation (0.05 - 0.95, split-merge notes).
    pub onset_threshold: f32,
    /// Confidence threshold (0.05 - 0.95, more-less notes).
    pub frame_threshold: f32,
    /// Notes must be strictly longer than this, in frames.
    pub min_note_len_frames: i32,
    pub infer_onsets: bool,
    /// In Hz, negative means unbounded.
    pub max_frequency: f32,
    /// In Hz, negative means unbounded.
    pub min_frequency: f32,
    pub melodia_trick: bool,
    pub pitch_bend: PitchBendMode,
    /// Consecutive frames below `frame_threshold` that end a note.
    pub energy_threshold: i32,
}

impl Default for ConvertParams {
    fn default() -> Self {
        Self {
            onset_threshold: 0.3,
            frame_threshold: 0.5,
            min_note_len_frames: 11,
            infer_onsets: true,
            max_frequency: -1.0,
            min_frequency: -1.0,
            melodia_trick: true,
            pitch_bend: PitchBendMode::None,
            energy_threshold: 11,
        }
    }
}

/// The user-facing knobs of a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Higher gives more notes.
    pub note_sensibility: f32,
    /// Higher splits notes more, lower merges close notes with the same pitch.
    pub split_sensibility: f32,
    /// Minimum note duration to keep, in ms.
    pub min_note_duration_ms: f32,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            note_sensibility: 0.5,
            split_sensibility: 0.5,
            min_note_duration_ms: 100.0,
        }
    }
}

impl TranscriptionSettings {
    /// Apply the settings on top of `params`.
    ///
    /// Multi pitch bends, the melodia trick and inferred onsets are always enabled.
    pub fn apply(&self, params: &mut ConvertParams) {
        params.frame_threshold = 1.0 - self.note_sensibility;
        params.onset_threshold = 1.0 - self.split_sensibility;
        params.min_note_len_frames =
            (self.min_note_duration_ms * FFT_HOP as f32 / AUDIO_SAMPLE_RATE as f32).round() as i32;

        params.pitch_bend = PitchBendMode::Multi;
        params.melodia_trick = true;
        params.infer_onsets = true;
    }

    pub fn to_convert_params(&self) -> ConvertParams {
        let mut params = ConvertParams::default();
        self.apply(&mut params);
        params
    }
}

/// Raw bytes of the five models a detector is built from.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub features_model: Vec<u8>,
    pub contour_model_json: Vec<u8>,
    pub note_model_json: Vec<u8>,
    pub onset_input_model_json: Vec<u8>,
    pub onset_output_model_json: Vec<u8>,
}

impl ModelFiles {
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        log::info!("Loading models from {}", dir.display());

        Ok(Self {
            features_model: fs::read(dir.join(FEATURES_MODEL_FILE))?,
            contour_model_json: fs::read(dir.join(CONTOUR_MODEL_FILE))?,
            note_model_json: fs::read(dir.join(NOTE_MODEL_FILE))?,
            onset_input_model_json: fs::read(dir.join(ONSET_INPUT_MODEL_FILE))?,
            onset_output_model_json: fs::read(dir.join(ONSET_OUTPUT_MODEL_FILE))?,
        })
    }
}
