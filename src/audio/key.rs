use std::fmt;

use serde::Serialize;

use super::spectrum::SpectrumAnalyzer;
use crate::chord::templates::PitchClass;

// Krumhansl-Kessler probe-tone profiles, tonic at index 0.
#[rustfmt::skip]
const KK_MAJOR: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09,
    2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
#[rustfmt::skip]
const KK_MINOR: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53,
    2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const KEY_FRAME_SIZE: usize = 8192;
const KEY_HOP_SIZE: usize = 8192;
const KEY_MIN_FREQ: f32 = 55.0;
const KEY_MAX_FREQ: f32 = 4000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectedKey {
    pub tonic: PitchClass,
    pub mode: KeyMode,
    pub score: f32,
}

impl fmt::Display for DetectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic, mode)
    }
}

pub trait KeyDetector {
    /// `None` when the excerpt carries no pitched energy at all.
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Option<DetectedKey>;
}

/// Correlates a track-wide pitch-class histogram against the major and
/// minor profiles at all twelve rotations.
#[derive(Debug)]
pub struct ProfileKeyDetector {
    /// Only the first `window_secs` of audio are inspected.
    pub window_secs: f32,
}

impl Default for ProfileKeyDetector {
    fn default() -> Self {
        Self { window_secs: 60.0 }
    }
}

impl KeyDetector for ProfileKeyDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Option<DetectedKey> {
        let limit = ((self.window_secs * sample_rate as f32) as usize).min(samples.len());
        let histogram = pitch_class_histogram(&samples[..limit], sample_rate);
        if histogram.iter().all(|&v| v <= 0.0) {
            return None;
        }

        let mut best: Option<DetectedKey> = None;
        for shift in 0..12 {
            for (profile, mode) in [(&KK_MAJOR, KeyMode::Major), (&KK_MINOR, KeyMode::Minor)] {
                let score = pearson_correlate(&histogram, profile, shift);
                if best.map_or(true, |b| score > b.score) {
                    best = Some(DetectedKey {
                        tonic: PitchClass::from_index(shift),
                        mode,
                        score,
                    });
                }
            }
        }
        best
    }
}

fn pitch_class_histogram(samples: &[f32], sample_rate: u32) -> [f32; 12] {
    let mut histogram = [0.0f32; 12];
    if samples.len() < KEY_FRAME_SIZE || sample_rate == 0 {
        return histogram;
    }

    let mut analyzer = SpectrumAnalyzer::new(KEY_FRAME_SIZE);
    let bin_width = sample_rate as f32 / KEY_FRAME_SIZE as f32;
    let min_bin = (KEY_MIN_FREQ / bin_width).ceil().max(1.0) as usize;

    let mut pos = 0;
    while pos + KEY_FRAME_SIZE <= samples.len() {
        let mags = analyzer.magnitudes(&samples[pos..pos + KEY_FRAME_SIZE]);
        let max_bin = ((KEY_MAX_FREQ / bin_width) as usize).min(mags.len() - 1);
        for (bin, &mag) in mags.iter().enumerate().take(max_bin + 1).skip(min_bin) {
            let freq = bin as f32 * bin_width;
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            let pc = (midi.round() as i32).rem_euclid(12) as usize;
            histogram[pc] += mag * mag;
        }
        pos += KEY_HOP_SIZE;
    }
    histogram
}

/// Pearson correlation of `chroma` rotated by `shift` against `profile`.
fn pearson_correlate(chroma: &[f32; 12], profile: &[f32; 12], shift: usize) -> f32 {
    let mut x = [0.0f32; 12];
    for (i, v) in x.iter_mut().enumerate() {
        *v = chroma[(i + shift) % 12];
    }

    let mean_x = x.iter().sum::<f32>() / 12.0;
    let mean_y = profile.iter().sum::<f32>() / 12.0;

    let mut cov = 0.0f32;
    let mut var_x = 0.0f32;
    let mut var_y = 0.0f32;
    for i in 0..12 {
        let dx = x[i] - mean_x;
        let dy = profile[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom > 1e-10 {
        cov / denom
    } else {
        0.0
    }
}
