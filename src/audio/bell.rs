//! Round bell synthesis

use std::f32::consts::PI;

/// Sample rate used for the bell and other generated cues
pub const BELL_SAMPLE_RATE: u32 = 44_100;

const BELL_SECONDS: f32 = 0.8;
const FUNDAMENTAL_HZ: f32 = 880.0;
// Inharmonic partial that gives the "ding" its metallic edge
const OVERTONE_RATIO: f32 = 2.76;

/// Generate a short decaying bell tone (mono f32, -1.0..=1.0)
pub fn bell_tone(sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as f32 * BELL_SECONDS) as usize;
    let attack = (sample_rate as f32 * 0.005) as usize;

    (0..total)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = if i < attack {
                i as f32 / attack.max(1) as f32
            } else {
                (-5.0 * t).exp()
            };
            let fundamental = (2.0 * PI * FUNDAMENTAL_HZ * t).sin();
            let overtone = (2.0 * PI * FUNDAMENTAL_HZ * OVERTONE_RATIO * t).sin() * (-9.0 * t).exp();
            (fundamental * 0.6 + overtone * 0.3) * envelope
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_length() {
        let samples = bell_tone(16_000);
        assert_eq!(samples.len(), (16_000.0 * BELL_SECONDS) as usize);
    }

    #[test]
    fn test_bell_in_range_and_decays() {
        let samples = bell_tone(BELL_SAMPLE_RATE);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));

        let head: f32 = samples[..2_000].iter().map(|s| s.abs()).sum();
        let tail: f32 = samples[samples.len() - 2_000..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 5.0);
    }
}
