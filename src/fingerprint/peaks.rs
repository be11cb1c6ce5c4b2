//! 2-D spectral peak picking
//!
//! A point is a peak when its energy equals the maximum over a
//! rectangular time-frequency neighborhood and clears the amplitude
//! floor. The neighborhood is 20 bins by 10 frames; for these even
//! extents the window sits left-heavy around the point
//! (`f - 10 ..= f + 9`, `t - 5 ..= t + 4`), clipped at the grid edges.
//! Equal-valued neighbors each qualify, so plateaus can yield more than
//! one peak.

use crate::fingerprint::spectrogram::Spectrogram;

/// Neighborhood extent along the frequency axis (bins)
pub const NEIGHBORHOOD_FREQ: usize = 20;

/// Neighborhood extent along the time axis (frames)
pub const NEIGHBORHOOD_TIME: usize = 10;

/// Minimum energy for a peak, in dB
pub const AMPLITUDE_THRESHOLD: f32 = -40.0;

/// A spectral peak at frame `time`, frequency bin `freq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub time: usize,
    pub freq: usize,
}

/// Find all spectral peaks, ordered by time ascending, then frequency.
pub fn find_peaks(spectrogram: &Spectrogram) -> Vec<Peak> {
    let num_frames = spectrogram.num_frames();
    let num_bins = spectrogram.num_bins();
    let mut peaks = Vec::new();

    let freq_before = NEIGHBORHOOD_FREQ / 2;
    let freq_after = NEIGHBORHOOD_FREQ - freq_before - 1;
    let time_before = NEIGHBORHOOD_TIME / 2;
    let time_after = NEIGHBORHOOD_TIME - time_before - 1;

    // Outer loop over time keeps the output sorted (t asc, f asc)
    // without a separate sort pass.
    for t in 0..num_frames {
        let t_start = t.saturating_sub(time_before);
        let t_end = (t + time_after + 1).min(num_frames);

        for f in 0..num_bins {
            let energy = spectrogram.frames[t][f];
            if energy <= AMPLITUDE_THRESHOLD {
                continue;
            }

            let f_start = f.saturating_sub(freq_before);
            let f_end = (f + freq_after + 1).min(num_bins);

            let mut is_max = true;
            'neighborhood: for nt in t_start..t_end {
                let frame = &spectrogram.frames[nt];
                for nf in f_start..f_end {
                    if frame[nf] > energy {
                        is_max = false;
                        break 'neighborhood;
                    }
                }
            }

            if is_max {
                peaks.push(Peak { time: t, freq: f });
            }
        }
    }

    peaks
}
