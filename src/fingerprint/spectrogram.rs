//! Magnitude spectrogram via short-time Fourier analysis
//!
//! Hann-windowed, non-centered STFT. Frame `t` covers samples
//! `[t * hop, t * hop + n_fft)`, so a buffer of `N` samples yields
//! `(N - n_fft) / hop + 1` frames. Magnitudes are converted to decibels
//! relative to the spectrogram's own peak and floored at -80 dB.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// FFT window size in samples
pub const N_FFT: usize = 2048;

/// Hop between consecutive frames in samples
pub const HOP_LENGTH: usize = 512;

/// Number of retained frequency bins per frame
pub const NUM_BINS: usize = N_FFT / 2 + 1;

/// Low-energy floor in dB; everything quieter is clamped here
pub const DB_FLOOR: f32 = -80.0;

/// Dense time-frequency grid of dB values.
///
/// `frames[t][f]` is the energy of frequency bin `f` at frame `t`.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
}

impl Spectrogram {
    /// Number of time frames
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frequency bins per frame
    pub fn num_bins(&self) -> usize {
        self.frames.first().map_or(0, |f| f.len())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Compute the dB spectrogram of a mono sample buffer.
///
/// Buffers shorter than one analysis window produce an empty
/// spectrogram; downstream stages then emit no peaks and no hashes.
pub fn compute(samples: &[f32]) -> Spectrogram {
    if samples.len() < N_FFT {
        return Spectrogram { frames: Vec::new() };
    }

    let num_frames = (samples.len() - N_FFT) / HOP_LENGTH + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let window = hann_window(N_FFT);

    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); N_FFT];
    let mut frames: Vec<Vec<f32>> = Vec::with_capacity(num_frames);
    let mut max_magnitude = 0.0f32;

    for i in 0..num_frames {
        let start = i * HOP_LENGTH;
        let chunk = &samples[start..start + N_FFT];

        for (j, &sample) in chunk.iter().enumerate() {
            buffer[j] = Complex::new(sample * window[j], 0.0);
        }

        fft.process(&mut buffer);

        let mut magnitudes = Vec::with_capacity(NUM_BINS);
        for bin in buffer.iter().take(NUM_BINS) {
            let magnitude = bin.norm();
            max_magnitude = max_magnitude.max(magnitude);
            magnitudes.push(magnitude);
        }
        frames.push(magnitudes);
    }

    // Convert to dB relative to the global peak and floor low energies.
    // The 1e-10 clamp keeps log10 finite for zero bins; those land on
    // the floor regardless.
    for frame in &mut frames {
        for value in frame.iter_mut() {
            *value = if max_magnitude > 0.0 {
                (20.0 * (*value / max_magnitude).max(1e-10).log10()).max(DB_FLOOR)
            } else {
                DB_FLOOR
            };
        }
    }

    Spectrogram { frames }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}
