//! WAV fixtures for tests.

use std::path::Path;

fn spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

pub fn write_sine(path: &Path, freq: f32, amplitude: f32, sample_rate: u32, seconds: f32) {
    let mut writer = hound::WavWriter::create(path, spec(1, sample_rate)).unwrap();
    let total = (seconds * sample_rate as f32).round() as usize;
    for i in 0..total {
        let t = i as f32 / sample_rate as f32;
        let s = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
        writer.write_sample(to_i16(s)).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn write_dc(path: &Path, level: f32, sample_rate: u32, seconds: f32) {
    let mut writer = hound::WavWriter::create(path, spec(1, sample_rate)).unwrap();
    let total = (seconds * sample_rate as f32).round() as usize;
    for _ in 0..total {
        writer.write_sample(to_i16(level)).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn write_stereo_dc(path: &Path, left: f32, right: f32, sample_rate: u32, seconds: f32) {
    let mut writer = hound::WavWriter::create(path, spec(2, sample_rate)).unwrap();
    let total = (seconds * sample_rate as f32).round() as usize;
    for _ in 0..total {
        writer.write_sample(to_i16(left)).unwrap();
        writer.write_sample(to_i16(right)).unwrap();
    }
    writer.finalize().unwrap();
}
