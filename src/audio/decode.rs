use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Mono waveform at the file's native sample rate.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode at most `max_duration_secs` of `path`, downmixed to mono.
///
/// Files shorter than the limit are returned in full without padding.
pub fn decode_audio(path: &Path, max_duration_secs: f64) -> Result<AudioData, DecodeError> {
    let file = std::fs::File::open(path).map_err(|e| DecodeError::new(path, e))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::new(path, format!("unrecognized format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::new(path, "no audio tracks found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|&sr| sr > 0)
        .ok_or_else(|| DecodeError::new(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::new(path, format!("unsupported codec: {e}")))?;

    let max_samples = sample_limit(max_duration_secs, sample_rate);
    let mut all_samples: Vec<f32> = Vec::new();

    while all_samples.len() < max_samples {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(DecodeError::new(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(DecodeError::new(path, e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // channel layout of the decoded buffer, the track header may omit it
        downmix_into(sample_buf.samples(), spec.channels.count(), &mut all_samples);
    }

    all_samples.truncate(max_samples);

    if all_samples.is_empty() {
        return Err(DecodeError::new(path, "no audio samples decoded"));
    }

    let audio = AudioData {
        samples: all_samples,
        sample_rate,
    };

    log::debug!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        audio.samples.len(),
        sample_rate,
        audio.duration_secs()
    );

    Ok(audio)
}

/// Average interleaved frames of `channels` samples into `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    for frame_samples in interleaved.chunks(channels) {
        let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
        out.push(mono);
    }
}

fn sample_limit(max_duration_secs: f64, sample_rate: u32) -> usize {
    if !max_duration_secs.is_finite() {
        return usize::MAX;
    }
    (max_duration_secs.max(0.0) * sample_rate as f64).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn decodes_wav_at_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        testutil::write_sine(&path, 440.0, 0.5, 8000, 1.0);

        let audio = decode_audio(&path, 30.0).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.samples.len(), 8000);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
        let peak = audio.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01);
    }

    #[test]
    fn truncates_to_max_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        testutil::write_sine(&path, 220.0, 0.5, 8000, 2.0);

        let audio = decode_audio(&path, 0.5).unwrap();
        assert_eq!(audio.samples.len(), 4000);
    }

    #[test]
    fn short_file_is_not_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        testutil::write_sine(&path, 220.0, 0.5, 8000, 0.25);

        let audio = decode_audio(&path, 30.0).unwrap();
        assert_eq!(audio.samples.len(), 2000);
    }

    #[test]
    fn stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        testutil::write_stereo_dc(&path, 0.5, -0.25, 8000, 0.1);

        let audio = decode_audio(&path, 30.0).unwrap();
        assert_eq!(audio.samples.len(), 800);
        for s in &audio.samples {
            assert!((s - 0.125).abs() < 1e-3, "sample {s}");
        }
    }

    #[test]
    fn downmix_follows_buffer_channel_count() {
        let mut out = vec![9.0];
        downmix_into(&[0.3, 0.6, 0.9, -0.3, 0.0, 0.3], 3, &mut out);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.6).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);

        let mut mono = Vec::new();
        downmix_into(&[0.1, 0.2, 0.3], 1, &mut mono);
        assert_eq!(mono, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn zero_byte_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();

        let err = decode_audio(&path, 30.0).err().unwrap();
        assert_eq!(err.path, path);
    }

    #[test]
    fn garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header, just text").unwrap();

        assert!(decode_audio(&path, 30.0).is_err());
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wav");
        let err = decode_audio(&path, 30.0).err().unwrap();
        assert_eq!(err.path, path);
    }
}
