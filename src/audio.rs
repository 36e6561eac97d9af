/// Average interleaved channels into a single mono channel
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

/// Convert 16-bit PCM to floats in [-1.0, 1.0)
pub fn to_unit_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Resample audio from source sample rate to target rate
pub fn resample(samples: &[i16], src_rate: u32, target_rate: u32) -> Vec<i16> {
    if src_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / src_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let sample = if src_idx + 1 < samples.len() {
            let s1 = samples[src_idx] as f64;
            let s2 = samples[src_idx + 1] as f64;
            (s1 + frac * (s2 - s1)) as i16
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0
        };

        resampled.push(sample);
    }

    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let stereo = [100, 300, -200, -400, 0, 10];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![200, -300, 5]);
        assert_eq!(downmix_to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_to_unit_float_range() {
        let floats = to_unit_float(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(floats[0], -1.0);
        assert_eq!(floats[1], 0.0);
        assert!(floats[2] < 1.0 && floats[2] > 0.999);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<i16> = (0..32000).map(|i| (i % 100) as i16).collect();
        let resampled = resample(&samples, 32000, 16000);
        assert_eq!(resampled.len(), 16000);
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }
}
