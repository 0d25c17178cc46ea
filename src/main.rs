use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;

use basic_pitch_streaming::postprocessing::midi::{generate_midi_file_data, MidiOptions};
use basic_pitch_streaming::preprocessing::load_audio::load_audio;
use basic_pitch_streaming::{ConvertParams, ModelFiles, PitchDetector, TranscriptionSettings};

/// Transcribe a WAV file to MIDI
#[derive(Parser, Debug)]
#[clap(name = "basic-pitch-streaming")]
struct Args {
    /// Directory holding the feature model and the four CNN weight files
    #[clap(long, value_name = "DIR", default_value = "model_data")]
    models: PathBuf,

    /// Input WAV file, any sample rate
    input: PathBuf,

    /// Output MIDI file
    #[clap(short, long, default_value = "output.mid")]
    output: PathBuf,

    /// Also write the note events as JSON
    #[clap(long, value_name = "FILE")]
    events_json: Option<PathBuf>,

    /// Higher gives more notes (0.05 - 0.95)
    #[clap(long, default_value = "0.5")]
    note_sensibility: f32,

    /// Higher splits notes more (0.05 - 0.95)
    #[clap(long, default_value = "0.5")]
    split_sensibility: f32,

    /// Minimum note duration in ms
    #[clap(long, default_value = "100")]
    min_note_duration_ms: f32,

    /// JSON file with conversion parameters, replaces the three settings above
    #[clap(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Tempo of the MIDI file
    #[clap(long, default_value = "120")]
    bpm: u32,

    /// Write pitch bends for a synth with this bend range in semitones
    #[clap(long, value_name = "SEMITONES")]
    pitch_bend_range: Option<f32>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let models = ModelFiles::from_dir(&args.models)?;
    let mut detector = PitchDetector::new(&models)?;

    match &args.params {
        Some(path) => {
            let params: ConvertParams = serde_json::from_slice(&fs::read(path)?)?;
            detector.set_convert_params(params);
        }
        None => detector.apply_settings(&TranscriptionSettings {
            note_sensibility: args.note_sensibility,
            split_sensibility: args.split_sensibility,
            min_note_duration_ms: args.min_note_duration_ms,
        }),
    }

    let audio = load_audio(&args.input)?;
    detector.transcribe(&audio)?;
    let events = detector.latest_note_events();
    log::info!("Transcribed {} notes from {}", events.len(), args.input.display());

    let midi = generate_midi_file_data(
        events,
        &MidiOptions {
            beats_per_minute: args.bpm,
            pitch_bend_range: args.pitch_bend_range,
        },
    )?;
    fs::write(&args.output, midi)?;

    if let Some(path) = &args.events_json {
        fs::write(path, serde_json::to_vec_pretty(events)?)?;
    }

    println!("{} notes written to {}", events.len(), args.output.display());
    Ok(())
}
