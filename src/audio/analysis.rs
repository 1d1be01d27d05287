use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::AudioData;
use super::features::{FeatureFrame, FeatureFrames};
use crate::error::AnalysisError;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const N_CHROMA: usize = 12;
const A4_HZ: f64 = 440.0;
const ENERGY_FLOOR: f64 = 1e-10;

/// Turns a waveform into per-frame feature matrices.
///
/// Implementations must be deterministic: the same samples and rate always
/// produce the same frames.
pub trait SpectralAnalyzer: Sync {
    fn analyze(&self, audio: &AudioData) -> Result<FeatureFrames, AnalysisError>;
}

/// Short-time Fourier analysis with centered, reflect-padded frames.
#[derive(Clone, Debug)]
pub struct StftAnalyzer {
    pub fft_size: usize,
    pub hop_size: usize,
}

impl Default for StftAnalyzer {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            hop_size: HOP_SIZE,
        }
    }
}

impl SpectralAnalyzer for StftAnalyzer {
    fn analyze(&self, audio: &AudioData) -> Result<FeatureFrames, AnalysisError> {
        if audio.samples.is_empty() {
            return Err(AnalysisError::EmptySignal);
        }
        if audio.sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(audio.sample_rate));
        }

        let n_fft = self.fft_size;
        let hop = self.hop_size.max(1);
        let sr = audio.sample_rate as f64;

        let padded = reflect_pad(&audio.samples, n_fft / 2);
        let n_frames = 1 + (padded.len() - n_fft) / hop;
        let n_bins = n_fft / 2 + 1;

        let window = hann_window(n_fft);
        let freqs: Vec<f64> = (0..n_bins).map(|k| k as f64 * sr / n_fft as f64).collect();
        let pitch_classes: Vec<Option<usize>> = freqs.iter().map(|&f| pitch_class(f)).collect();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let mut chroma = vec![0.0f64; N_CHROMA * n_frames];
        let mut rms = Vec::with_capacity(n_frames);
        let mut centroid = Vec::with_capacity(n_frames);
        let mut bandwidth = Vec::with_capacity(n_frames);

        let mut buffer = vec![Complex::new(0.0f64, 0.0); n_fft];
        let mut magnitudes = vec![0.0f64; n_bins];

        for t in 0..n_frames {
            let frame = &padded[t * hop..t * hop + n_fft];

            let mean_sq = frame.iter().map(|s| s * s).sum::<f64>() / n_fft as f64;
            rms.push(mean_sq.sqrt());

            for (slot, (&s, &w)) in buffer.iter_mut().zip(frame.iter().zip(window.iter())) {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);
            for (m, c) in magnitudes.iter_mut().zip(buffer.iter()) {
                *m = c.norm();
            }

            let total: f64 = magnitudes.iter().sum();
            let c = if total > ENERGY_FLOOR {
                magnitudes
                    .iter()
                    .zip(freqs.iter())
                    .map(|(&m, &f)| m * f)
                    .sum::<f64>()
                    / total
            } else {
                0.0
            };
            let bw = if total > ENERGY_FLOOR {
                magnitudes
                    .iter()
                    .zip(freqs.iter())
                    .map(|(&m, &f)| (m / total) * (f - c).powi(2))
                    .sum::<f64>()
                    .sqrt()
            } else {
                0.0
            };
            centroid.push(c);
            bandwidth.push(bw);

            let mut classes = [0.0f64; N_CHROMA];
            for (&m, pc) in magnitudes.iter().zip(pitch_classes.iter()) {
                if let Some(pc) = pc {
                    classes[*pc] += m * m;
                }
            }
            let peak = classes.iter().copied().fold(0.0f64, f64::max);
            if peak > ENERGY_FLOOR {
                for (row, value) in classes.iter().enumerate() {
                    chroma[row * n_frames + t] = value / peak;
                }
            }
        }

        Ok(FeatureFrames {
            chroma_stft: FeatureFrame::new(N_CHROMA, n_frames, chroma),
            rms: FeatureFrame::row(rms),
            spectral_centroid: FeatureFrame::row(centroid),
            spectral_bandwidth: FeatureFrame::row(bandwidth),
        })
    }
}

/// Nearest pitch class (C = 0) for a frequency, `None` for DC.
fn pitch_class(freq: f64) -> Option<usize> {
    if freq <= 0.0 {
        return None;
    }
    let midi = 69.0 + 12.0 * (freq / A4_HZ).log2();
    Some((midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize)
}

/// Mirror the signal around its end samples, excluding the edge sample itself.
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f64> {
    let n = samples.len();
    let period = 2 * n.saturating_sub(1);
    (0..n + 2 * pad)
        .map(|j| {
            if period == 0 {
                return samples[0] as f64;
            }
            let m = (j as isize - pad as isize).rem_euclid(period as isize) as usize;
            let idx = if m >= n { period - m } else { m };
            samples[idx] as f64
        })
        .collect()
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos()))
        .collect()
}
