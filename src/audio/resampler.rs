//! Sample-rate conversion and PCM16 conversion.
//!
//! Pure numeric transforms with no side effects: the quality-preserving
//! playback path uses the identity case, the transcription path downsamples
//! to the service's fixed rate.

/// Resamples `input` from `source_rate` to `target_rate` using linear
/// interpolation between the two nearest source samples.
///
/// When the rates are equal the input is returned unchanged. Output length
/// is `floor(len * target_rate / source_rate)`. Deterministic, no error
/// cases.
pub fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let mut output = Vec::new();
    resample_into(input, source_rate, target_rate, &mut output);
    output
}

/// [`resample`] appending into a caller-owned buffer, so the capture
/// callback can reuse one allocation across invocations.
pub fn resample_into(input: &[f32], source_rate: u32, target_rate: u32, out: &mut Vec<f32>) {
    if source_rate == target_rate {
        out.extend_from_slice(input);
        return;
    }
    if input.is_empty() || source_rate == 0 || target_rate == 0 {
        return;
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    out.reserve(output_len);
    let last = input.len() - 1;

    for i in 0..output_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let next = (idx + 1).min(last);
        let frac = (pos - idx as f64) as f32;
        let sample = input[idx.min(last)] * (1.0 - frac) + input[next] * frac;
        out.push(sample);
    }
}

/// Converts normalized f32 samples to signed 16-bit PCM, clamping to
/// [-1.0, 1.0] before scaling to [-32767, 32767].
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect()
}

/// Serializes PCM16 samples as little-endian bytes for the wire.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
