use ndarray::{Array2, ArrayView2, Zip};

use crate::constants::{ANNOTATIONS_BASE_FREQUENCY, CONTOURS_BINS_PER_SEMITONE, MAX_NOTE_IDX, MIDI_OFFSET};

use super::ported::librosa::hz_to_midi;
use super::ported::numpy::global_max;

/// Closest note index (0 = MIDI 21) to a frequency, clamped to the keyboard.
///
/// # Arguments
///
/// * `hz` - Frequency in Hz. Negative values mean "unbounded" and are handled by the caller.
pub fn frequency_to_note_index(hz: f32) -> usize {
    let midi = hz_to_midi(hz).round() as i64;
    (midi - MIDI_OFFSET as i64).clamp(0, MAX_NOTE_IDX as i64) as usize
}

/// Infer onsets from large rises in note confidence.
///
/// For each frame offset `1..=n_diff`, the rise of the note posteriorgram over that offset is
/// computed; the smallest rise across offsets is kept (negative rises count as 0, and the first
/// `n_diff` frames get 0 since they have no full history). These minima are rescaled to the range
/// of the onset posteriorgram and combined with it by element-wise max.
///
/// # Arguments
///
/// * `onsets` - Onset posteriorgram (n_frames, n_notes).
/// * `notes` - Note posteriorgram (n_frames, n_notes).
/// * `n_diff` - Number of differences to compute.
///
/// # Returns
///
/// * The inferred onsets, same shape as `onsets`.
pub fn get_inferred_onsets(onsets: ArrayView2<f32>, notes: ArrayView2<f32>, n_diff: usize) -> Array2<f32> {
    let (n_frames, n_notes) = notes.dim();

    // Seeded with 1 so any probability diff replaces it.
    let mut min_diffs = Array2::<f32>::ones((n_frames, n_notes));

    for offset in 1..=n_diff {
        for frame in 0..n_frames {
            for note in 0..n_notes {
                let behind = frame.checked_sub(offset).map_or(0.0, |i| notes[[i, note]]);
                let diff = notes[[frame, note]] - behind;

                let min = &mut min_diffs[[frame, note]];
                if diff < *min {
                    *min = if frame >= n_diff { diff.max(0.0) } else { 0.0 };
                }
            }
        }
    }

    let max_min_diff = global_max(&min_diffs);
    if max_min_diff <= 0.0 {
        log::debug!("No rising note confidence found, keeping predicted onsets");
        return onsets.to_owned();
    }

    let scale = global_max(onsets) / max_min_diff;
    Zip::from(&mut min_diffs).and(onsets).for_each(|inferred, &onset| {
        *inferred = onset.max(*inferred * scale);
    });

    min_diffs
}

/// Return a symmetric gaussian window.
///
/// The gaussian window is defined as:
///   w(n) = exp(-1/2 * (n / sigma)^2)
///
/// # Arguments
///
/// * `m` - Number of points in the output window. If zero, an empty array is returned.
/// * `std` - The standard deviation, sigma.
///
/// # Returns
///
/// * The window, with the maximum value normalized to 1.
pub fn gaussian(m: usize, std: f32) -> Vec<f32> {
    if m == 0 {
        return vec![];
    }

    let midpoint = (m - 1) as f32 / 2.0;
    (0..m)
        .map(|n| (-(n as f32 - midpoint).powi(2) / (2.0 * std.powi(2))).exp())
        .collect()
}

/// Converts a MIDI pitch to its centre bin in the contour posteriorgram.
pub fn midi_pitch_to_contour_bin(pitch_midi: usize) -> isize {
    let base_midi = 69 - (12.0 * (440.0 / ANNOTATIONS_BASE_FREQUENCY).log2()).round() as isize;
    CONTOURS_BINS_PER_SEMITONE as isize * (pitch_midi as isize - base_midi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_frequency_to_note_index() {
        assert_eq!(frequency_to_note_index(27.5), 0);
        assert_eq!(frequency_to_note_index(440.0), 48);
        assert_eq!(frequency_to_note_index(10.0), 0);
        assert_eq!(frequency_to_note_index(20_000.0), 87);
    }

    #[test]
    fn test_midi_pitch_to_contour_bin() {
        assert_eq!(midi_pitch_to_contour_bin(21), 0);
        assert_eq!(midi_pitch_to_contour_bin(69), 144);
        assert_eq!(midi_pitch_to_contour_bin(108), 261);
    }

    #[test]
    fn test_gaussian_window() {
        let w = gaussian(51, 5.0);
        assert_eq!(w.len(), 51);
        assert_eq!(w[25], 1.0);
        assert!((w[20] - (-0.5f32).exp()).abs() < 1e-6);
        assert!(gaussian(0, 5.0).is_empty());
    }

    #[test]
    fn test_inferred_onsets_flag_rises() {
        let notes = array![[0.0], [0.0], [0.0], [0.8], [0.8], [0.8]];
        let onsets = array![[0.0], [0.0], [0.0], [0.0], [0.0], [0.4]];

        let inferred = get_inferred_onsets(onsets.view(), notes.view(), 2);

        // Rise at frame 3 is rescaled to the onset maximum; the held note adds nothing.
        assert!((inferred[[3, 0]] - 0.4).abs() < 1e-6);
        assert_eq!(inferred[[4, 0]], 0.0);
        assert_eq!(inferred[[5, 0]], 0.4);
        assert_eq!(inferred[[0, 0]], 0.0);
    }

    #[test]
    fn test_inferred_onsets_without_rises_keep_onsets() {
        let notes = Array2::<f32>::zeros((5, 3));
        let onsets = Array2::<f32>::from_elem((5, 3), 0.1);

        let inferred = get_inferred_onsets(onsets.view(), notes.view(), 2);
        assert_eq!(inferred, onsets);
        assert!(inferred.iter().all(|v| v.is_finite()));
    }
}
