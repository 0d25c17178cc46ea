use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::constants::AUDIO_SAMPLE_RATE;
use crate::error::Result;

/// Read a WAV file as mono samples in [-1, 1], resampled to `AUDIO_SAMPLE_RATE`.
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    log::info!(
        "Loading {} ({} Hz, {} channels, {} bits)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max_sample_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_sample_value))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    resample(mono, spec.sample_rate, AUDIO_SAMPLE_RATE as u32)
}

/// Average interleaved channels into one.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio in a single pass, keeping the duration.
pub fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let resample_ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * resample_ratio) as usize;

    let mut resampler = SincFixedIn::<f64>::new(resample_ratio, 2.0, params, samples.len(), 1)?;
    let channel_data = vec![samples.into_iter().map(f64::from).collect::<Vec<f64>>()];
    let resampled = resampler.process(&channel_data, None)?;

    let mut output: Vec<f32> = resampled
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|s| s as f32)
        .collect();
    output.resize(expected_len, 0.0);

    log::debug!("Resampled {} Hz to {} Hz, {} samples", from_rate, to_rate, output.len());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_keeps_duration() {
        let samples = vec![0.0; 44100];
        let resampled = resample(samples, 44100, 22050).unwrap();
        assert_eq!(resampled.len(), 22050);

        let same = resample(vec![0.5; 10], 22050, 22050).unwrap();
        assert_eq!(same, vec![0.5; 10]);
    }

    #[test]
    fn test_load_wav_file() {
        let path = std::env::temp_dir().join(format!("load_audio_{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: AUDIO_SAMPLE_RATE as u32,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let samples = load_audio(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_audio("/nonexistent/audio.wav").is_err());
    }
}
