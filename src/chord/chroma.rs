use crate::audio::spectrum::SpectrumAnalyzer;

/// Samples per analysis frame.
pub const FRAME_SIZE: usize = 8192;
/// Sample advance between consecutive frames (75% overlap).
pub const HOP_SIZE: usize = 2048;

pub const PITCH_CLASSES: usize = 12;

/// Energy per pitch class, C at index 0 through B at index 11.
pub type Chroma = [f32; PITCH_CLASSES];

/// One analysis frame, either gated out as silence or carrying a chroma.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameChroma {
    Silent,
    Voiced(Chroma),
}

impl FrameChroma {
    pub fn voiced(&self) -> Option<&Chroma> {
        match self {
            FrameChroma::Silent => None,
            FrameChroma::Voiced(c) => Some(c),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChromaParams {
    /// Frames with RMS below this are silent.
    pub rms_gate: f32,
    /// Minimum magnitude for a spectral peak.
    pub noise_floor: f32,
    pub min_freq: f32,
    pub max_freq: f32,
    /// Peaks below this frequency get `bass_weight` instead of 1.0.
    pub bass_cutoff: f32,
    pub bass_weight: f32,
}

impl Default for ChromaParams {
    fn default() -> Self {
        Self {
            rms_gate: 0.015,
            noise_floor: 0.1,
            min_freq: 50.0,
            max_freq: 2000.0,
            bass_cutoff: 150.0,
            bass_weight: 4.0,
        }
    }
}

/// Frame-wise chroma extraction with a reusable spectrum analyzer.
pub struct ChromaExtractor {
    spectrum: SpectrumAnalyzer,
    sample_rate: u32,
    params: ChromaParams,
}

impl ChromaExtractor {
    pub fn new(sample_rate: u32, params: ChromaParams) -> Self {
        Self {
            spectrum: SpectrumAnalyzer::new(FRAME_SIZE),
            sample_rate,
            params,
        }
    }

    pub fn extract(&mut self, frame: &[f32]) -> FrameChroma {
        if rms(frame) < self.params.rms_gate {
            return FrameChroma::Silent;
        }
        let spectrum = self.spectrum.magnitudes(frame);
        FrameChroma::Voiced(spectrum_to_chroma(spectrum, self.sample_rate, &self.params))
    }
}

pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Folds the spectral peaks between `min_freq` and `max_freq` onto pitch
/// classes and normalizes by the strongest class.
pub fn spectrum_to_chroma(spectrum: &[f32], sample_rate: u32, params: &ChromaParams) -> Chroma {
    let mut chroma = [0.0f32; PITCH_CLASSES];
    if spectrum.len() < 3 {
        return chroma;
    }

    let bin_width = sample_rate as f32 / (2.0 * (spectrum.len() - 1) as f32);
    let min_bin = ((params.min_freq / bin_width).floor() as usize).max(1);
    let max_bin = ((params.max_freq / bin_width).floor() as usize).min(spectrum.len() - 1);

    for i in min_bin..max_bin {
        let mag = spectrum[i];
        if mag <= spectrum[i - 1] || mag <= spectrum[i + 1] {
            continue;
        }
        if mag < params.noise_floor {
            continue;
        }

        let freq = i as f32 * bin_width;
        let midi = (69.0 + 12.0 * (freq / 440.0).log2()).round() as i32;
        if midi <= 0 {
            continue;
        }

        let weight = if freq < params.bass_cutoff {
            params.bass_weight
        } else {
            1.0
        };
        chroma[(midi % 12) as usize] += mag * weight;
    }

    normalize_max(&mut chroma);
    chroma
}

fn normalize_max(chroma: &mut Chroma) {
    let max = chroma.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        chroma.iter_mut().for_each(|v| *v /= max);
    }
}
