use serde::{Deserialize, Serialize};

/// A detected note, in frames and in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteEvent {
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: usize,
    /// Exclusive.
    pub end_frame: usize,
    pub midi_note_number: u8,
    pub amplitude: f64,
    /// One pitch bend value per frame in `start_frame..end_frame`, in thirds of a semitone.
    pub bends: Vec<i32>,
}

impl NoteEvent {
    pub fn duration_frames(&self) -> usize {
        self.end_frame.saturating_sub(self.start_frame)
    }
}

/// Sort events by start frame, then end frame. Stable.
pub fn sort_events(events: &mut [NoteEvent]) {
    events.sort_by_key(|event| (event.start_frame, event.end_frame));
}

/// Clear the pitch bends of every event overlapping another one in time.
/// `events` must be sorted.
pub fn drop_overlapping_pitch_bends(events: &mut [NoteEvent]) {
    let mut overlapping = vec![false; events.len()];

    for i in 0..events.len() {
        for j in i + 1..events.len() {
            if events[j].start_frame >= events[i].end_frame {
                break;
            }
            overlapping[i] = true;
            overlapping[j] = true;
        }
    }

    for (event, _) in events.iter_mut().zip(overlapping).filter(|(_, o)| *o) {
        event.bends.clear();
    }
}

/// Merge events of the same pitch that overlap in time into one event spanning their union.
///
/// Bends stay one per frame: when both events carry bends, the frames gained from the later event
/// take its bends; otherwise the merged event has none.
pub fn merge_overlapping_notes_with_same_pitch(events: &mut Vec<NoteEvent>) {
    sort_events(events);

    let mut i = 0;
    while i < events.len() {
        let mut j = i + 1;
        while j < events.len() && events[j].start_frame < events[i].end_frame {
            if events[j].midi_note_number != events[i].midi_note_number {
                j += 1;
                continue;
            }

            let later = events.remove(j);
            let event = &mut events[i];
            if later.end_frame > event.end_frame {
                if !event.bends.is_empty() && !later.bends.is_empty() {
                    let skip = event.end_frame - later.start_frame;
                    event.bends.extend(later.bends.iter().skip(skip));
                } else {
                    event.bends.clear();
                }
                event.end_frame = later.end_frame;
                event.end_time = later.end_time;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(start_frame: usize, end_frame: usize, midi_note_number: u8) -> NoteEvent {
        NoteEvent {
            start_time: start_frame as f64 * 0.01,
            end_time: end_frame as f64 * 0.01,
            start_frame,
            end_frame,
            midi_note_number,
            amplitude: 0.5,
            bends: vec![0; end_frame - start_frame],
        }
    }

    #[test]
    fn test_sort_events() {
        let mut events = vec![event(5, 9, 60), event(2, 8, 61), event(2, 4, 62)];
        sort_events(&mut events);
        let order: Vec<_> = events.iter().map(|e| (e.start_frame, e.end_frame)).collect();
        assert_eq!(order, vec![(2, 4), (2, 8), (5, 9)]);
    }

    #[test]
    fn test_merge_overlapping_same_pitch_spans_union() {
        let mut events = vec![event(10, 20, 60), event(15, 30, 60)];
        events[1].bends = (0..15).collect();

        merge_overlapping_notes_with_same_pitch(&mut events);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_frame, 10);
        assert_eq!(events[0].end_frame, 30);
        assert_eq!(events[0].end_time, event(15, 30, 60).end_time);
        assert_eq!(events[0].bends.len(), 20);
        assert_eq!(events[0].bends[10..].to_vec(), (5..15).collect::<Vec<i32>>());
    }

    #[test]
    fn test_merge_keeps_other_pitches_and_contained_events() {
        let mut events = vec![
            event(10, 40, 60),
            event(12, 20, 60),
            event(15, 25, 64),
            event(30, 50, 60),
            event(60, 70, 60),
        ];

        merge_overlapping_notes_with_same_pitch(&mut events);

        let spans: Vec<_> = events
            .iter()
            .map(|e| (e.start_frame, e.end_frame, e.midi_note_number))
            .collect();
        assert_eq!(spans, vec![(10, 50, 60), (15, 25, 64), (60, 70, 60)]);
    }

    #[test]
    fn test_drop_overlapping_pitch_bends() {
        let mut events = vec![event(0, 10, 60), event(5, 15, 64), event(20, 30, 60)];

        drop_overlapping_pitch_bends(&mut events);

        assert!(events[0].bends.is_empty());
        assert!(events[1].bends.is_empty());
        assert_eq!(events[2].bends.len(), 10);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let event: NoteEvent = serde_json::from_str(r#"{ "start_frame": 3, "midi_note_number": 60 }"#).unwrap();
        assert_eq!(
            event,
            NoteEvent {
                start_frame: 3,
                midi_note_number: 60,
                ..Default::default()
            }
        );
    }
}
