//! Combinatorial landmark hashing
//!
//! Pairs each anchor peak with up to [`FAN_OUT`] later peaks inside a
//! bounded temporal window and derives a fixed-width hash from the
//! quantized `(anchor_freq, target_freq, delta_t)` triple. Quantization
//! by 2 absorbs FFT bin jitter between the reference recording and a
//! noisy query of the same material.

use crate::fingerprint::peaks::Peak;
use sha1::{Digest, Sha1};

/// Maximum pairs emitted per anchor peak
pub const FAN_OUT: usize = 5;

/// Minimum frame distance from anchor to target
pub const MIN_TIME_DELTA: usize = 1;

/// Maximum frame distance from anchor to target
pub const MAX_TIME_DELTA: usize = 40;

/// Landmark hash width in bytes (20 hex characters of SHA-1)
pub const HASH_LEN: usize = 10;

/// A landmark: truncated hash plus the anchor's frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landmark {
    pub hash: [u8; HASH_LEN],
    pub anchor_time: u32,
}

/// Generate landmarks from a time-ordered peak list.
///
/// For each anchor the scan moves forward through later peaks; it stops
/// as soon as the temporal window is exceeded or the fan-out budget is
/// spent. The peak list must be sorted by time (as produced by
/// `find_peaks`), otherwise the early break truncates valid pairs.
pub fn generate_landmarks(peaks: &[Peak]) -> Vec<Landmark> {
    let mut landmarks = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let mut pairs = 0;

        for target in &peaks[i + 1..] {
            let delta_t = target.time - anchor.time;

            if delta_t > MAX_TIME_DELTA {
                break;
            }

            if delta_t >= MIN_TIME_DELTA {
                landmarks.push(Landmark {
                    hash: landmark_hash(anchor.freq, target.freq, delta_t),
                    anchor_time: anchor.time as u32,
                });
                pairs += 1;
            }

            if pairs >= FAN_OUT {
                break;
            }
        }
    }

    landmarks
}

/// Hash one anchor/target pair.
///
/// SHA-1 over the canonical `"{fa/2}|{ft/2}|{dt/2}"` string, truncated
/// to the first [`HASH_LEN`] bytes. Stable across implementations; the
/// Python reference produces the identical 20 hex characters.
pub fn landmark_hash(anchor_freq: usize, target_freq: usize, delta_t: usize) -> [u8; HASH_LEN] {
    let canonical = format!("{}|{}|{}", anchor_freq / 2, target_freq / 2, delta_t / 2);

    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&digest[..HASH_LEN]);
    hash
}
