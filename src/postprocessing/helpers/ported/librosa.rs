/* PORTED LIBROSA FUNCTIONS */

use crate::constants::{AUDIO_SAMPLE_RATE, FFT_HOP};

/// Converts a frequency in Hz to the corresponding (fractional) MIDI pitch.
///
/// # Arguments
///
/// * `hz` - A frequency in Hz.
///
/// # Returns
///
/// * The corresponding MIDI pitch.
pub fn hz_to_midi(hz: f32) -> f32 {
    12.0 * (hz.log2() - 440.0f32.log2()) + 69.0
}

/// Converts from the model's "frame" time to seconds.
///
/// # Arguments
///
/// * `frame` - The model's "frame".
///
/// # Returns
///
/// * The time the frame starts at, in seconds.
pub fn model_frame_to_time(frame: usize) -> f64 {
    (frame * FFT_HOP) as f64 / AUDIO_SAMPLE_RATE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_midi_conversions() {
        assert_eq!(hz_to_midi(440.0), 69.0);
        assert!((hz_to_midi(27.5) - 21.0).abs() < 1e-4);
    }

    #[test]
    fn test_model_frame_to_time() {
        assert_eq!(model_frame_to_time(0), 0.0);
        assert!((model_frame_to_time(86) - 86.0 * 256.0 / 22050.0).abs() < 1e-12);
    }
}
