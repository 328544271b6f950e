use serde::Deserialize;
use std::path::Path;

use crate::chord::chroma::ChromaParams;
use crate::chord::pipeline::PipelineSettings;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_rms_gate")]
    pub rms_gate: f32,
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f32,
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
    #[serde(default = "default_bass_cutoff")]
    pub bass_cutoff: f32,
    #[serde(default = "default_bass_weight")]
    pub bass_weight: f32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_checkpoint_hops")]
    pub checkpoint_hops: usize,
    #[serde(default = "default_key_window_secs")]
    pub key_window_secs: f32,
}

#[derive(Debug, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_beats_per_measure")]
    pub beats_per_measure: usize,
    #[serde(default = "default_measures_per_row")]
    pub measures_per_row: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rms_gate: default_rms_gate(),
            noise_floor: default_noise_floor(),
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
            bass_cutoff: default_bass_cutoff(),
            bass_weight: default_bass_weight(),
            smoothing: default_smoothing(),
            match_threshold: default_match_threshold(),
            checkpoint_hops: default_checkpoint_hops(),
            key_window_secs: default_key_window_secs(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            beats_per_measure: default_beats_per_measure(),
            measures_per_row: default_measures_per_row(),
        }
    }
}

impl AnalysisConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chroma: ChromaParams {
                rms_gate: self.rms_gate,
                noise_floor: self.noise_floor,
                min_freq: self.min_freq,
                max_freq: self.max_freq,
                bass_cutoff: self.bass_cutoff,
                bass_weight: self.bass_weight,
            },
            smoothing: self.smoothing.clamp(0.0, 1.0),
            match_threshold: self.match_threshold,
            checkpoint_hops: self.checkpoint_hops.max(1),
        }
    }
}

fn default_rms_gate() -> f32 { 0.015 }
fn default_noise_floor() -> f32 { 0.1 }
fn default_min_freq() -> f32 { 50.0 }
fn default_max_freq() -> f32 { 2000.0 }
fn default_bass_cutoff() -> f32 { 150.0 }
fn default_bass_weight() -> f32 { 4.0 }
fn default_smoothing() -> f32 { 0.7 }
fn default_match_threshold() -> f32 { 0.75 }
fn default_checkpoint_hops() -> usize { 100 }
fn default_key_window_secs() -> f32 { 60.0 }
fn default_beats_per_measure() -> usize { crate::grid::DEFAULT_BEATS_PER_MEASURE }
fn default_measures_per_row() -> usize { 4 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.analysis.pipeline_settings(), PipelineSettings::default());
        assert_eq!(config.grid.beats_per_measure, 4);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            "[analysis]\nmatch_threshold = 0.8\n\n[grid]\nmeasures_per_row = 2\n",
        )
        .unwrap();
        let settings = config.analysis.pipeline_settings();
        assert_eq!(settings.match_threshold, 0.8);
        assert_eq!(settings.chroma.rms_gate, 0.015);
        assert_eq!(config.grid.measures_per_row, 2);
        assert_eq!(config.grid.beats_per_measure, 4);
    }

    #[test]
    fn smoothing_is_clamped() {
        let config: Config = toml::from_str("[analysis]\nsmoothing = 1.5\n").unwrap();
        assert_eq!(config.analysis.pipeline_settings().smoothing, 1.0);
    }

    #[test]
    fn missing_file_is_none() {
        assert!(load_config(Path::new("/nonexistent/chordgrid.toml")).is_none());
    }
}
