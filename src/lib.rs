//! Streaming polyphonic pitch transcription.
//!
//! Audio is turned into harmonically stacked spectral frames, run frame by frame through four
//! small convolutional stages whose outputs are re-aligned with ring buffers, and the resulting
//! contour, note and onset posteriorgrams are decoded into note events.

pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod features;
pub mod inference;
pub mod cnn {
    pub mod architecture;
    pub mod layers;
    pub mod model;
    pub mod pipeline;
}
pub mod preprocessing {
    pub mod load_audio;
}
pub mod postprocessing {
    pub mod helpers {
        pub mod ported {
            pub mod librosa;
            pub mod numpy;
        }
        pub mod helpers;
    }
    pub mod midi;
    pub mod note_event;
    pub mod note_event_frames;
}

pub use config::{ConvertParams, ModelFiles, PitchBendMode, TranscriptionSettings};
pub use detector::PitchDetector;
pub use error::{Error, Result};
pub use features::{FeatureExtractor, OnnxFeatureExtractor};
pub use inference::Posteriorgrams;
pub use postprocessing::note_event::NoteEvent;
