use ndarray::{s, Array2, ArrayView2};

use crate::config::{ConvertParams, PitchBendMode};
use crate::constants::{MIDI_OFFSET, PITCH_BEND_BINS_TOLERANCE, PITCH_BEND_GAUSSIAN_STD};

use super::helpers::helpers::{frequency_to_note_index, gaussian, get_inferred_onsets, midi_pitch_to_contour_bin};
use super::helpers::ported::librosa::model_frame_to_time;
use super::helpers::ported::numpy::arg_max;
use super::note_event::{drop_overlapping_pitch_bends, sort_events, NoteEvent};

/// Decode aligned posteriorgrams into sorted polyphonic note events.
///
/// # Arguments
///
/// * `notes` - Note posteriorgram (n_frames, n_notes).
/// * `onsets` - Onset posteriorgram (n_frames, n_notes).
/// * `contours` - Contour posteriorgram (n_frames, n_notes * 3).
/// * `params` - Conversion parameters.
///
/// # Panics
///
/// If the three matrices do not have the same number of frames, or notes and onsets differ in width.
pub fn convert(
    notes: ArrayView2<f32>,
    onsets: ArrayView2<f32>,
    contours: ArrayView2<f32>,
    params: &ConvertParams,
) -> Vec<NoteEvent> {
    let (n_frames, n_notes) = notes.dim();
    if n_frames == 0 {
        return vec![];
    }
    assert_eq!(onsets.dim(), notes.dim(), "onset and note posteriorgrams differ in shape");
    assert_eq!(contours.nrows(), n_frames, "contour posteriorgram differs in frame count");

    let inferred;
    let onsets = if params.infer_onsets {
        inferred = get_inferred_onsets(onsets, notes, 2);
        inferred.view()
    } else {
        onsets.reborrow()
    };

    let mut extractor = NoteExtractor {
        notes: notes.reborrow(),
        remaining_energy: notes.to_owned(),
        params,
        last_frame: n_frames - 1,
        max_note_idx: n_notes - 1,
        events: vec![],
    };

    let visited = extractor.onset_pass(onsets, note_index_bounds(params, n_notes));
    if params.melodia_trick {
        extractor.melodia_pass(visited);
    }

    let mut events = extractor.events;
    sort_events(&mut events);

    if params.pitch_bend != PitchBendMode::None {
        add_pitch_bends(&mut events, contours, PITCH_BEND_BINS_TOLERANCE);
        if params.pitch_bend == PitchBendMode::Single {
            drop_overlapping_pitch_bends(&mut events);
        }
    }

    log::debug!("Extracted {} note events from {} frames", events.len(), n_frames);
    events
}

/// Inclusive (min, max) note indices allowed by the frequency bounds.
fn note_index_bounds(params: &ConvertParams, n_notes: usize) -> (usize, usize) {
    let max_note_idx = n_notes - 1;
    let min = if params.min_frequency < 0.0 {
        0
    } else {
        frequency_to_note_index(params.min_frequency).min(max_note_idx)
    };
    let max = if params.max_frequency < 0.0 {
        max_note_idx
    } else {
        frequency_to_note_index(params.max_frequency).min(max_note_idx)
    };
    (min, max)
}

struct NoteExtractor<'a> {
    notes: ArrayView2<'a, f32>,
    // Note posteriorgram, zeroed as frames get claimed by notes.
    remaining_energy: Array2<f32>,
    params: &'a ConvertParams,
    // Never part of a note.
    last_frame: usize,
    max_note_idx: usize,
    events: Vec<NoteEvent>,
}

impl NoteExtractor<'_> {
    /// Walk backwards in time and grow a note forward from every onset peak.
    ///
    /// Returns every (frame, note) visited, in visiting order.
    fn onset_pass(&mut self, onsets: ArrayView2<f32>, (min_note_idx, max_note_idx): (usize, usize)) -> Vec<(usize, usize)> {
        let mut visited = vec![];
        if min_note_idx > max_note_idx {
            return visited;
        }
        if self.params.melodia_trick {
            visited.reserve(self.last_frame * (max_note_idx - min_note_idx + 1));
        }

        for frame_idx in (0..self.last_frame).rev() {
            for note_idx in (min_note_idx..=max_note_idx).rev() {
                if self.params.melodia_trick {
                    visited.push((frame_idx, note_idx));
                }

                if !is_onset_peak(onsets, frame_idx, note_idx, self.last_frame, self.params.onset_threshold) {
                    continue;
                }

                let end = self.find_note_end(frame_idx, note_idx);
                if (end - frame_idx) as i64 <= self.params.min_note_len_frames as i64 {
                    continue;
                }

                let mut amplitude = 0.0f64;
                for frame in frame_idx..end {
                    amplitude += self.remaining_energy[[frame, note_idx]] as f64;
                    self.zero_with_neighbors(frame, note_idx);
                }
                amplitude /= (end - frame_idx) as f64;

                self.push_event(frame_idx, end, note_idx, amplitude);
            }
        }

        visited
    }

    /// First frame after `start` where the remaining energy stays below the frame threshold for
    /// `energy_threshold` frames (or the buffer ends), backed off to the end of the last
    /// above-threshold frame.
    fn find_note_end(&self, start: usize, note_idx: usize) -> usize {
        let mut i = start + 1;
        let mut k = 0; // number of frames since energy dropped below threshold
        while i < self.last_frame && k < self.params.energy_threshold {
            if self.remaining_energy[[i, note_idx]] < self.params.frame_threshold {
                k += 1;
            } else {
                k = 0;
            }
            i += 1;
        }
        i - k as usize
    }

    /// Recover notes from the energy left over by the onset pass, strongest cells first.
    fn melodia_pass(&mut self, visited: Vec<(usize, usize)>) {
        let mut candidates: Vec<(f32, usize, usize)> = visited
            .into_iter()
            .map(|(frame, note)| (self.remaining_energy[[frame, note]], frame, note))
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let frame_threshold = self.params.frame_threshold;
        let energy_threshold = self.params.energy_threshold;

        for (_, frame_idx, note_idx) in candidates {
            let energy = self.remaining_energy[[frame_idx, note_idx]];
            if energy == 0.0 {
                continue;
            }
            if energy <= frame_threshold {
                break;
            }
            self.remaining_energy[[frame_idx, note_idx]] = 0.0;

            // forward pass
            let mut i = frame_idx + 1;
            let mut k = 0;
            while i < self.last_frame && k < energy_threshold {
                k = self.inhibit(i, note_idx, k);
                i += 1;
            }
            let i_end = i - 1 - k as usize;

            // backward pass
            let mut i = frame_idx as isize - 1;
            let mut k = 0;
            while i > 0 && k < energy_threshold {
                k = self.inhibit(i as usize, note_idx, k);
                i -= 1;
            }
            let i_start = (i + 1 + k as isize) as usize;

            // An isolated cell has nothing around it.
            if i_end <= i_start {
                continue;
            }
            if i_end as i64 - i_start as i64 <= self.params.min_note_len_frames as i64 {
                continue;
            }

            let amplitude = self
                .notes
                .slice(s![i_start..i_end, note_idx])
                .iter()
                .map(|&v| v as f64)
                .sum::<f64>()
                / (i_end - i_start) as f64;

            self.push_event(i_start, i_end, note_idx, amplitude);
        }
    }

    /// Zero a frame of a note and its neighbours, returning the updated count of consecutive
    /// frames below the frame threshold.
    fn inhibit(&mut self, frame: usize, note_idx: usize, k: i32) -> i32 {
        let below = self.remaining_energy[[frame, note_idx]] < self.params.frame_threshold;
        self.zero_with_neighbors(frame, note_idx);
        if below {
            k + 1
        } else {
            0
        }
    }

    /// Claim a frame for a note: zero it along with the semitones directly above and below, so
    /// the same energy cannot produce a second note a semitone away.
    fn zero_with_neighbors(&mut self, frame: usize, note_idx: usize) {
        self.remaining_energy[[frame, note_idx]] = 0.0;
        if note_idx < self.max_note_idx {
            self.remaining_energy[[frame, note_idx + 1]] = 0.0;
        }
        if note_idx > 0 {
            self.remaining_energy[[frame, note_idx - 1]] = 0.0;
        }
    }

    fn push_event(&mut self, start_frame: usize, end_frame: usize, note_idx: usize, amplitude: f64) {
        self.events.push(NoteEvent {
            start_time: model_frame_to_time(start_frame),
            end_time: model_frame_to_time(end_frame),
            start_frame,
            end_frame,
            midi_note_number: (note_idx + MIDI_OFFSET) as u8,
            amplitude,
            bends: vec![],
        });
    }
}

/// Onset above threshold and not smaller than its direct neighbours in time.
/// Edge frames compare against themselves.
fn is_onset_peak(onsets: ArrayView2<f32>, frame_idx: usize, note_idx: usize, last_frame: usize, threshold: f32) -> bool {
    let onset = onsets[[frame_idx, note_idx]];
    let prev = if frame_idx == 0 {
        onset
    } else {
        onsets[[frame_idx - 1, note_idx]]
    };
    let next = if frame_idx >= last_frame {
        onset
    } else {
        onsets[[frame_idx + 1, note_idx]]
    };

    onset >= threshold && onset >= prev && onset >= next
}

/// Add pitch bends to note events based on the contours.
///
/// Every frame of an event gets the offset, in contour bins, of the strongest contour bin within
/// `n_bins_tolerance` bins of the note centre, after weighting by a gaussian centred on the note.
///
/// # Arguments
///
/// * `events` - Note events; their bends are replaced.
/// * `contours` - Contour posteriorgram.
/// * `n_bins_tolerance` - Number of bins tolerance.
pub fn add_pitch_bends(events: &mut [NoteEvent], contours: ArrayView2<f32>, n_bins_tolerance: usize) {
    let window_length = n_bins_tolerance * 2 + 1;
    let freq_gaussian = gaussian(window_length, PITCH_BEND_GAUSSIAN_STD);
    let n_bins = contours.ncols() as isize;
    let tolerance = n_bins_tolerance as isize;

    let mut weighted = Vec::with_capacity(window_length);
    for event in events.iter_mut() {
        let freq_idx = midi_pitch_to_contour_bin(event.midi_note_number as usize);
        let freq_start_idx = (freq_idx - tolerance).max(0);
        let freq_end_idx = (freq_idx + tolerance + 1).min(n_bins);
        let gauss_start = (tolerance - freq_idx).max(0) as usize;

        event.bends = (event.start_frame..event.end_frame)
            .map(|frame| {
                let row = contours.row(frame);
                weighted.clear();
                weighted.extend(
                    (freq_start_idx..freq_end_idx)
                        .zip(&freq_gaussian[gauss_start..])
                        .map(|(bin, &g)| row[bin as usize] * g),
                );
                arg_max(&weighted).map_or(0, |best| (freq_start_idx + best as isize - freq_idx) as i32)
            })
            .collect();
    }
}
