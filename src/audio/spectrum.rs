use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Windowed FFT magnitude spectrum over fixed-size frames.
///
/// Owns its working buffers so a long frame loop allocates them once; they
/// are released when the analyzer goes out of scope, whichever way the
/// caller exits.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Analyzer over an area-normalized Hann window.
    pub fn new(frame_size: usize) -> Self {
        Self::with_window(normalized_hann(frame_size))
    }

    /// Analyzer whose frame size is the length of `window`.
    pub fn with_window(window: Vec<f32>) -> Self {
        let frame_size = window.len();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); frame_size],
            scratch,
            magnitudes: vec![0.0; frame_size / 2 + 1],
        }
    }

    /// Magnitude spectrum of one frame, `frame_size / 2 + 1` bins.
    ///
    /// `frame` must be exactly `frame_size` samples long.
    pub fn magnitudes(&mut self, frame: &[f32]) -> &[f32] {
        debug_assert_eq!(frame.len(), self.window.len());

        for ((slot, &s), &w) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm();
        }
        &self.magnitudes
    }
}

/// Symmetric Hann window with unit peak.
pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    let span = size.saturating_sub(1).max(1) as f32;
    (0..size)
        .map(|i| (std::f32::consts::PI * i as f32 / span).sin().powi(2))
        .collect()
}

/// Hann window scaled to an area of 2, so a full-scale sinusoid that lands
/// on a bin reads back at roughly its own amplitude.
fn normalized_hann(size: usize) -> Vec<f32> {
    let mut window = hann_window(size);
    let area: f32 = window.iter().sum();
    if area > 0.0 {
        let scale = 2.0 / area;
        window.iter_mut().for_each(|w| *w *= scale);
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_has_half_plus_one_bins() {
        let mut analyzer = SpectrumAnalyzer::new(1024);
        let frame = vec![0.0; 1024];
        assert_eq!(analyzer.magnitudes(&frame).len(), 513);
    }

    #[test]
    fn on_bin_sine_reads_back_its_amplitude() {
        let size = 4096;
        let sample_rate = 44100.0;
        let bin = 100;
        let freq = bin as f32 * sample_rate / size as f32;
        let frame: Vec<f32> = (0..size)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new(size);
        let mags = analyzer.magnitudes(&frame);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
        assert!((mags[bin] - 0.5).abs() < 0.02, "got {}", mags[bin]);
    }

    #[test]
    fn raw_hann_keeps_fft_scale() {
        let size = 4096;
        let sample_rate = 44100.0;
        let bin = 100;
        let freq = bin as f32 * sample_rate / size as f32;
        let frame: Vec<f32> = (0..size)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        // Amplitude times half the window area, (size - 1) / 2
        let mut analyzer = SpectrumAnalyzer::with_window(hann_window(size));
        let mags = analyzer.magnitudes(&frame);
        assert!((mags[bin] - 512.0).abs() < 5.0, "got {}", mags[bin]);
    }

    #[test]
    fn hann_is_symmetric_with_zero_ends() {
        let w = hann_window(9);
        assert!(w[0].abs() < 1e-6 && w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn window_area_is_two() {
        let w = normalized_hann(2048);
        let area: f32 = w.iter().sum();
        assert!((area - 2.0).abs() < 1e-3);
    }
}
