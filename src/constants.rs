// Audio
pub const AUDIO_SAMPLE_RATE: usize = 22050;
pub const FFT_HOP: usize = 256;

// Features
pub const NUM_HARMONICS: usize = 8;
pub const NUM_FREQ_IN: usize = 264;
pub const NUM_FREQ_OUT: usize = 88;
pub const FEATURE_FRAME_SIZE: usize = NUM_HARMONICS * NUM_FREQ_IN;

// Onset input channels per pitch row, and the concatenated row width fed to the onset output stage
pub const ONSET_INPUT_CHANNELS: usize = 32;
pub const ONSET_CONCAT_CHANNELS: usize = ONSET_INPUT_CHANNELS + 1;

// MIDI Conversion
pub const MIDI_OFFSET: usize = 21;
pub const MAX_NOTE_IDX: usize = NUM_FREQ_OUT - 1;

// Pitch bends
pub const ANNOTATIONS_BASE_FREQUENCY: f32 = 27.5; // lowest key on a piano
pub const CONTOURS_BINS_PER_SEMITONE: usize = 3;
pub const PITCH_BEND_BINS_TOLERANCE: usize = 25;
pub const PITCH_BEND_GAUSSIAN_STD: f32 = 5.0;

// MIDI file
pub const TICKS_PER_BEAT: u16 = 220;
pub const DEFAULT_BEATS_PER_MINUTE: u32 = 120;

// Model files
pub const FEATURES_MODEL_FILE: &str = "features_model.ort";
pub const CONTOUR_MODEL_FILE: &str = "cnn_contour_model.json";
pub const NOTE_MODEL_FILE: &str = "cnn_note_model.json";
pub const ONSET_INPUT_MODEL_FILE: &str = "cnn_onset_1_model.json";
pub const ONSET_OUTPUT_MODEL_FILE: &str = "cnn_onset_2_model.json";
