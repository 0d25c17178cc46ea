use crate::cnn::pipeline::StagePipeline;
use crate::config::{ConvertParams, ModelFiles, TranscriptionSettings};
use crate::error::Result;
use crate::features::{FeatureExtractor, OnnxFeatureExtractor};
use crate::inference::{run_inference, Posteriorgrams};
use crate::postprocessing::note_event::NoteEvent;
use crate::postprocessing::note_event_frames::convert;

/// Audio to note events.
///
/// Owns the feature extractor, the convolutional stages and the posteriorgrams of the last
/// transcription, so parameters can be changed and notes re-extracted without rerunning the models.
pub struct PitchDetector<F: FeatureExtractor = OnnxFeatureExtractor> {
    features: F,
    pipeline: StagePipeline,
    convert_params: ConvertParams,
    posteriorgrams: Posteriorgrams,
    note_events: Vec<NoteEvent>,
}

impl PitchDetector<OnnxFeatureExtractor> {
    /// Build a detector from model blobs. Fails on any malformed model.
    pub fn new(models: &ModelFiles) -> Result<Self> {
        let features = OnnxFeatureExtractor::from_memory(&models.features_model)?;
        let pipeline = StagePipeline::from_json(
            &models.contour_model_json,
            &models.note_model_json,
            &models.onset_input_model_json,
            &models.onset_output_model_json,
        )?;

        log::info!("Pitch detector ready, lookahead {} frames", pipeline.lookahead_frames());
        Ok(Self::with_extractor(features, pipeline))
    }
}

impl<F: FeatureExtractor> PitchDetector<F> {
    pub fn with_extractor(features: F, pipeline: StagePipeline) -> Self {
        Self {
            features,
            pipeline,
            convert_params: ConvertParams::default(),
            posteriorgrams: Posteriorgrams::default(),
            note_events: vec![],
        }
    }

    /// Clear the model state, the posteriorgrams and the note events. Parameters are kept.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.posteriorgrams = Posteriorgrams::default();
        self.note_events.clear();
    }

    /// Set parameters for the next transcription or update.
    ///
    /// # Arguments
    ///
    /// * `note_sensibility` - (0.05, 0.95), higher gives more notes.
    /// * `split_sensibility` - (0.05, 0.95), higher splits notes more, lower merges close notes with the same pitch.
    /// * `min_note_duration_ms` - Minimum note duration to keep.
    pub fn set_parameters(&mut self, note_sensibility: f32, split_sensibility: f32, min_note_duration_ms: f32) {
        self.apply_settings(&TranscriptionSettings {
            note_sensibility,
            split_sensibility,
            min_note_duration_ms,
        });
    }

    pub fn apply_settings(&mut self, settings: &TranscriptionSettings) {
        settings.apply(&mut self.convert_params);
    }

    /// Replace every conversion parameter, including the ones `set_parameters` forces.
    pub fn set_convert_params(&mut self, params: ConvertParams) {
        self.convert_params = params;
    }

    pub fn convert_params(&self) -> &ConvertParams {
        &self.convert_params
    }

    /// Transcribe mono audio at 22050 Hz. Read the result with `latest_note_events`.
    pub fn transcribe(&mut self, audio: &[f32]) -> Result<()> {
        let features = self.features.compute_features(audio)?;
        self.posteriorgrams = run_inference(&mut self.pipeline, features.view());
        self.update_transcription();
        Ok(())
    }

    /// Re-extract notes from the last posteriorgrams with the current parameters.
    pub fn update_transcription(&mut self) {
        self.note_events = convert(
            self.posteriorgrams.notes.view(),
            self.posteriorgrams.onsets.view(),
            self.posteriorgrams.contours.view(),
            &self.convert_params,
        );
        log::debug!(
            "{} note events from {} frames",
            self.note_events.len(),
            self.posteriorgrams.num_frames()
        );
    }

    pub fn latest_note_events(&self) -> &[NoteEvent] {
        &self.note_events
    }

    /// Owned copy of the latest note events.
    pub fn note_events(&self) -> Vec<NoteEvent> {
        self.note_events.clone()
    }

    pub fn posteriorgrams(&self) -> &Posteriorgrams {
        &self.posteriorgrams
    }
}
