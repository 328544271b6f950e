use std::ops::RangeInclusive;

use super::spectrum::{hann_window, SpectrumAnalyzer};

const ONSET_FRAME: usize = 2048;
const ONSET_HOP: usize = 1024;
/// Frames either side in the local mean, about 0.45 s at 44.1 kHz.
const THRESHOLD_RADIUS: usize = 20;
const THRESHOLD_RATIO: f32 = 1.5;
const THRESHOLD_BIAS: f32 = 0.01;
/// Seconds.
const MIN_BEAT_GAP: f32 = 0.1;
const TEMPO_INTERVALS: RangeInclusive<f32> = 0.3..=1.0;

/// Spacing of the synthetic grid used when no usable beats were found.
pub const FALLBACK_BEAT_SPACING: f32 = 0.5;
pub const FALLBACK_BPM: f32 = 120.0;

/// Ordered beat onsets (seconds) with an estimated tempo.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatGrid {
    pub beats: Vec<f32>,
    pub bpm: f32,
}

impl BeatGrid {
    /// Evenly spaced half-second beats from 0 up to (not including) `duration`.
    pub fn synthetic(duration: f32) -> Self {
        let mut beats = Vec::new();
        let mut t = 0.0f32;
        let mut i = 0u32;
        while t < duration {
            beats.push(t);
            i += 1;
            t = i as f32 * FALLBACK_BEAT_SPACING;
        }
        Self {
            beats,
            bpm: FALLBACK_BPM,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.beats.len() >= 2
    }
}

pub trait BeatTracker {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> BeatGrid;
}

/// Beat onsets from adaptive-threshold peaks in spectral flux.
#[derive(Debug, Default)]
pub struct FluxBeatTracker;

impl BeatTracker for FluxBeatTracker {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> BeatGrid {
        let envelope = OnsetEnvelope::compute(samples, sample_rate);
        let beats = envelope.onsets();
        let bpm = median_tempo(&beats).unwrap_or(FALLBACK_BPM);
        log::debug!(
            "Flux tracker: {} onset frames, {} beats, {:.1} BPM",
            envelope.values.len(),
            beats.len(),
            bpm
        );
        BeatGrid { beats, bpm }
    }
}

/// Half-wave rectified spectral flux, one value per hop.
///
/// Frames use a raw (unit-peak) Hann window, so flux is on the FFT's own
/// magnitude scale and `THRESHOLD_BIAS` is relative to that.
struct OnsetEnvelope {
    hop_secs: f32,
    values: Vec<f32>,
}

impl OnsetEnvelope {
    fn compute(samples: &[f32], sample_rate: u32) -> Self {
        let mut analyzer = SpectrumAnalyzer::with_window(hann_window(ONSET_FRAME));
        let mut previous = vec![0.0f32; ONSET_FRAME / 2 + 1];

        let values: Vec<f32> = samples
            .windows(ONSET_FRAME)
            .step_by(ONSET_HOP)
            .map(|frame| {
                let current = analyzer.magnitudes(frame);
                let flux: f32 = current
                    .iter()
                    .zip(&previous)
                    .map(|(c, p)| (c - p).max(0.0))
                    .sum();
                previous.copy_from_slice(current);
                flux
            })
            .collect();

        Self {
            hop_secs: ONSET_HOP as f32 / sample_rate as f32,
            values,
        }
    }

    /// Local mean over `THRESHOLD_RADIUS` frames either side, scaled and biased.
    fn thresholds(&self) -> Vec<f32> {
        let mut prefix = Vec::with_capacity(self.values.len() + 1);
        prefix.push(0.0f64);
        for &v in &self.values {
            prefix.push(prefix[prefix.len() - 1] + v as f64);
        }

        (0..self.values.len())
            .map(|i| {
                let lo = i.saturating_sub(THRESHOLD_RADIUS);
                let hi = (i + THRESHOLD_RADIUS + 1).min(self.values.len());
                let mean = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
                mean as f32 * THRESHOLD_RATIO + THRESHOLD_BIAS
            })
            .collect()
    }

    fn is_local_max(&self, i: usize) -> bool {
        let v = self.values[i];
        let left = i.checked_sub(1).map_or(true, |j| v >= self.values[j]);
        let right = self.values.get(i + 1).map_or(true, |&next| v >= next);
        left && right
    }

    /// Onset times of local maxima above the threshold, at least
    /// `MIN_BEAT_GAP` apart.
    fn onsets(&self) -> Vec<f32> {
        let thresholds = self.thresholds();
        let mut onsets: Vec<f32> = Vec::new();
        for (i, (&v, &threshold)) in self.values.iter().zip(&thresholds).enumerate() {
            if v <= threshold || !self.is_local_max(i) {
                continue;
            }
            let t = i as f32 * self.hop_secs;
            if onsets.last().map_or(true, |&last| t - last > MIN_BEAT_GAP) {
                onsets.push(t);
            }
        }
        onsets
    }
}

/// 60 / median inter-beat interval, ignoring intervals outside 60-200 BPM.
fn median_tempo(beats: &[f32]) -> Option<f32> {
    let mut intervals: Vec<f32> = beats
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|i| TEMPO_INTERVALS.contains(i))
        .collect();
    if intervals.is_empty() {
        return None;
    }
    intervals.sort_by(f32::total_cmp);
    Some(60.0 / intervals[intervals.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_grid_spans_duration() {
        let grid = BeatGrid::synthetic(2.2);
        assert_eq!(grid.beats, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(grid.bpm, 120.0);
        assert!(grid.is_usable());
    }

    #[test]
    fn synthetic_grid_excludes_duration_endpoint() {
        let grid = BeatGrid::synthetic(1.0);
        assert_eq!(grid.beats, vec![0.0, 0.5]);
    }

    #[test]
    fn tempo_from_median_interval() {
        let beats = [0.0, 0.5, 1.0, 1.5, 2.0, 2.6];
        let bpm = median_tempo(&beats).unwrap();
        assert!((bpm - 120.0).abs() < 1e-3);
    }

    #[test]
    fn tempo_needs_a_plausible_interval() {
        assert_eq!(median_tempo(&[1.0]), None);
        assert_eq!(median_tempo(&[0.0, 5.0]), None);
        assert_eq!(median_tempo(&[0.0, 0.1, 0.2]), None);
    }

    #[test]
    fn envelope_has_one_value_per_full_frame() {
        let samples = vec![0.0; ONSET_FRAME + ONSET_HOP * 3 + 100];
        let envelope = OnsetEnvelope::compute(&samples, 44100);
        assert_eq!(envelope.values.len(), 4);
        assert!(OnsetEnvelope::compute(&samples[..ONSET_FRAME - 1], 44100)
            .values
            .is_empty());
    }

    #[test]
    fn flux_ignores_decay() {
        let sr = 44100;
        let mut samples: Vec<f32> = (0..ONSET_FRAME * 2)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();
        samples.extend(vec![0.0; ONSET_FRAME * 4]);

        let envelope = OnsetEnvelope::compute(&samples, sr);
        assert!(envelope.values[0] > 1.0);
        assert_eq!(*envelope.values.last().unwrap(), 0.0);
        assert!(envelope.values.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn flat_envelope_has_no_onsets() {
        let envelope = OnsetEnvelope {
            hop_secs: 0.02,
            values: vec![0.005; 50],
        };
        assert!(envelope.onsets().is_empty());
    }

    #[test]
    fn close_peaks_collapse_to_one_onset() {
        let mut values = vec![0.0; 40];
        values[10] = 5.0;
        values[12] = 6.0;
        values[30] = 5.0;
        let envelope = OnsetEnvelope {
            hop_secs: 0.02,
            values,
        };
        let onsets = envelope.onsets();
        assert_eq!(onsets.len(), 2);
        assert!((onsets[0] - 0.2).abs() < 1e-6);
        assert!((onsets[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn clicks_are_tracked() {
        let sr = 44100;
        let mut samples = vec![0.0f32; sr as usize * 4];
        // Short square-wave bursts every half second
        for k in 0..8 {
            let start = k * sr as usize / 2;
            for i in 0..512 {
                samples[start + i] = if (i / 3) % 2 == 0 { 0.9 } else { -0.9 };
            }
        }
        let grid = FluxBeatTracker.detect(&samples, sr);
        assert!(grid.beats.len() >= 4, "found {:?}", grid.beats);
        assert!(grid.beats.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn silence_has_no_beats() {
        let grid = FluxBeatTracker.detect(&vec![0.0; 44100], 44100);
        assert!(!grid.is_usable());
    }
}
