use midly::num::{u14, u24, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::constants::{CONTOURS_BINS_PER_SEMITONE, TICKS_PER_BEAT};
use crate::error::{Error, Result};

use super::note_event::NoteEvent;

/// Centre of the 14-bit pitch wheel.
const PITCH_BEND_CENTER: i32 = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiOptions {
    pub beats_per_minute: u32,
    /// Bend range of the receiving synth in semitones, `None` to leave pitch bends out.
    pub pitch_bend_range: Option<f32>,
}

impl Default for MidiOptions {
    fn default() -> Self {
        Self {
            beats_per_minute: crate::constants::DEFAULT_BEATS_PER_MINUTE,
            pitch_bend_range: None,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    // Note offs sort before bends, bends before note ons.
    priority: u8,
    kind: TrackEventKind<'a>,
}

fn midi_event(tick: u32, priority: u8, message: MidiMessage) -> TrackEventAbsolute<'static> {
    TrackEventAbsolute {
        tick,
        priority,
        kind: TrackEventKind::Midi {
            channel: 0.into(),
            message,
        },
    }
}

/// Convert a bend in thirds of a semitone to a pitch wheel position for a synth bending
/// `range` semitones either way.
pub fn bend_to_pitch_wheel(bend: i32, range: f32) -> u14 {
    let semitones = bend as f32 / CONTOURS_BINS_PER_SEMITONE as f32;
    let offset = (semitones / range * PITCH_BEND_CENTER as f32).round() as i32;
    let value = (offset + PITCH_BEND_CENTER).clamp(0, 2 * PITCH_BEND_CENTER - 1);
    u14::new(value as u16)
}

pub fn amplitude_to_velocity(amplitude: f64) -> u7 {
    u7::new((amplitude * 127.0).round().clamp(0.0, 127.0) as u8)
}

/// Turn note events into delta-timed track events, ordered by tick.
pub fn generate_ordered_midi_events(
    note_events: &[NoteEvent],
    ticks_per_second: f64,
    pitch_bend_range: Option<f32>,
) -> Vec<TrackEvent<'static>> {
    let mut track_events_absolute: Vec<TrackEventAbsolute> = vec![];
    for note_event in note_events {
        let key = u7::new(note_event.midi_note_number.min(127));
        let vel = amplitude_to_velocity(note_event.amplitude);

        let start_tick = (note_event.start_time * ticks_per_second).round() as u32;
        let end_tick = ((note_event.end_time * ticks_per_second).round() as u32).max(start_tick);

        track_events_absolute.push(midi_event(start_tick, 2, MidiMessage::NoteOn { key, vel }));
        track_events_absolute.push(midi_event(end_tick, 0, MidiMessage::NoteOff { key, vel }));

        let Some(range) = pitch_bend_range else {
            continue;
        };
        if note_event.bends.is_empty() {
            continue;
        }

        let duration = note_event.end_time - note_event.start_time;
        for (i, &bend) in note_event.bends.iter().enumerate() {
            let offset = i as f64 * duration / note_event.bends.len() as f64;
            let bend_tick = ((note_event.start_time + offset) * ticks_per_second).round() as u32;
            track_events_absolute.push(midi_event(
                bend_tick,
                1,
                MidiMessage::PitchBend {
                    bend: PitchBend(bend_to_pitch_wheel(bend, range)),
                },
            ));
        }
        track_events_absolute.push(midi_event(
            end_tick,
            0,
            MidiMessage::PitchBend {
                bend: PitchBend(u14::new(PITCH_BEND_CENTER as u16)),
            },
        ));
    }

    track_events_absolute.sort_by_key(|event| (event.tick, event.priority));

    let mut last_tick = 0;
    track_events_absolute
        .into_iter()
        .map(|event| {
            let delta = event.tick - last_tick;
            last_tick = event.tick;
            TrackEvent {
                delta: delta.into(),
                kind: event.kind,
            }
        })
        .collect()
}

/// Generate MIDI file data from note events.
///
/// # Arguments
///
/// * `notes` - Note events, with times in seconds.
/// * `options` - Tempo and pitch bend handling.
///
/// # Returns
///
/// * The bytes of a single-track Standard MIDI File.
pub fn generate_midi_file_data(notes: &[NoteEvent], options: &MidiOptions) -> Result<Vec<u8>> {
    if options.beats_per_minute == 0 {
        return Err(Error::Midi("tempo must be positive".to_string()));
    }
    let micros_per_beat = 60_000_000 / options.beats_per_minute;
    if micros_per_beat > u24::max_value().as_int() {
        return Err(Error::Midi(format!("tempo of {} bpm is too slow", options.beats_per_minute)));
    }
    if let Some(range) = options.pitch_bend_range {
        if !(range > 0.0) {
            return Err(Error::Midi(format!("invalid pitch bend range {}", range)));
        }
    }

    let ticks_per_second = TICKS_PER_BEAT as f64 * options.beats_per_minute as f64 / 60.0;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(TICKS_PER_BEAT.into()),
    });
    let mut track = Track::new();

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(micros_per_beat.into())),
    });
    track.extend(generate_ordered_midi_events(notes, ticks_per_second, options.pitch_bend_range));
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;

    log::debug!("Wrote {} note events as {} bytes of MIDI", notes.len(), buffer.len());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(start_time: f64, end_time: f64, midi_note_number: u8, bends: Vec<i32>) -> NoteEvent {
        NoteEvent {
            start_time,
            end_time,
            midi_note_number,
            amplitude: 0.5,
            bends,
            ..Default::default()
        }
    }

    fn midi_messages(bytes: &[u8]) -> Vec<(u32, MidiMessage)> {
        let smf = Smf::parse(bytes).unwrap();
        let mut tick = 0;
        let mut messages = vec![];
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                messages.push((tick, message));
            }
        }
        messages
    }

    #[test]
    fn test_velocity_is_clamped() {
        assert_eq!(amplitude_to_velocity(0.5).as_int(), 64);
        assert_eq!(amplitude_to_velocity(1.7).as_int(), 127);
        assert_eq!(amplitude_to_velocity(-0.2).as_int(), 0);
    }

    #[test]
    fn test_bend_to_pitch_wheel() {
        assert_eq!(bend_to_pitch_wheel(0, 2.0).as_int(), 0x2000);
        // Three bins are one semitone, half of a two semitone range.
        assert_eq!(bend_to_pitch_wheel(3, 2.0).as_int(), 0x3000);
        assert_eq!(bend_to_pitch_wheel(-3, 2.0).as_int(), 0x1000);
        assert_eq!(bend_to_pitch_wheel(25, 2.0).as_int(), 0x3FFF);
        assert_eq!(bend_to_pitch_wheel(-25, 2.0).as_int(), 0);
    }

    #[test]
    fn test_note_on_and_off_ticks() {
        // 120 bpm with 220 ticks per beat is 440 ticks per second.
        let notes = vec![note(0.5, 1.0, 60, vec![]), note(1.0, 1.5, 60, vec![])];
        let bytes = generate_midi_file_data(&notes, &MidiOptions::default()).unwrap();

        let messages = midi_messages(&bytes);
        let summary: Vec<_> = messages
            .iter()
            .map(|(tick, message)| match message {
                MidiMessage::NoteOn { key, .. } => (*tick, "on", key.as_int()),
                MidiMessage::NoteOff { key, .. } => (*tick, "off", key.as_int()),
                _ => (*tick, "other", 0),
            })
            .collect();
        assert_eq!(
            summary,
            vec![(220, "on", 60), (440, "off", 60), (440, "on", 60), (660, "off", 60)]
        );
    }

    #[test]
    fn test_pitch_bends_are_optional() {
        let notes = vec![note(0.0, 1.0, 60, vec![0, 3, 3, 0])];

        let without = midi_messages(&generate_midi_file_data(&notes, &MidiOptions::default()).unwrap());
        assert_eq!(without.len(), 2);

        let options = MidiOptions {
            pitch_bend_range: Some(2.0),
            ..Default::default()
        };
        let with = midi_messages(&generate_midi_file_data(&notes, &options).unwrap());
        let bends: Vec<_> = with
            .iter()
            .filter_map(|(tick, message)| match message {
                MidiMessage::PitchBend { bend } => Some((*tick, bend.0.as_int())),
                _ => None,
            })
            .collect();
        assert_eq!(bends, vec![(0, 0x2000), (110, 0x3000), (220, 0x3000), (330, 0x2000), (440, 0x2000)]);
    }

    #[test]
    fn test_invalid_tempo() {
        let options = MidiOptions {
            beats_per_minute: 0,
            ..Default::default()
        };
        assert!(matches!(generate_midi_file_data(&[], &options), Err(Error::Midi(_))));
    }
}
