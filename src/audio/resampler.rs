//! Audio resampling using rubato
//!
//! One-shot conversion of a fully decoded buffer to the analysis rate.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Resample a mono buffer from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match. The whole buffer is
/// processed as a single chunk; queries and reference tracks are short
/// enough that streaming chunk management buys nothing here.
///
/// # Errors
/// `Error::Decode` when the resampler cannot be constructed or fails.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        debug!("Sample rate already at {}Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }

    if input.is_empty() {
        return Ok(Vec::new());
    }

    debug!(
        "Resampling {} frames from {}Hz to {}Hz",
        input.len(),
        input_rate,
        output_rate
    );

    // FastFixedIn gives a good quality/performance tradeoff for
    // fingerprinting; the landmark pipeline quantizes away the last
    // fraction of a bin anyway.
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&[input], None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    let mono = output
        .into_iter()
        .next()
        .ok_or_else(|| Error::Decode("Resampler produced no channels".to_string()))?;

    debug!("Resampled to {} frames", mono.len());
    Ok(mono)
}
