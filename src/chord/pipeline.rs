use thiserror::Error;

use super::chroma::{ChromaExtractor, ChromaParams, FrameChroma, FRAME_SIZE, HOP_SIZE};
use super::matcher::{ChordLabel, TemplateMatcher, DEFAULT_MATCH_THRESHOLD};
use super::sync::{sync_chords, DEFAULT_SMOOTHING};
use super::templates::TemplateBank;

pub const DEFAULT_CHECKPOINT_HOPS: usize = 100;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("analysis cancelled")]
    Cancelled,
}

/// Receives progress at each checkpoint of the frame loop and may stop it.
pub trait PipelineObserver {
    fn progress(&mut self, percent: f32, message: &str);
    fn is_cancelled(&self) -> bool;
}

/// Observer for callers that need neither progress nor cancellation.
#[cfg(test)]
pub struct Unobserved;

#[cfg(test)]
impl PipelineObserver for Unobserved {
    fn progress(&mut self, _percent: f32, _message: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSettings {
    pub chroma: ChromaParams,
    /// Weight of the current beat when blending with the previous one.
    pub smoothing: f32,
    pub match_threshold: f32,
    /// Frames between progress reports and cancellation polls.
    pub checkpoint_hops: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chroma: ChromaParams::default(),
            smoothing: DEFAULT_SMOOTHING,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            checkpoint_hops: DEFAULT_CHECKPOINT_HOPS,
        }
    }
}

/// One chroma per hop, in time order. Frames that would run past the end of
/// the buffer are dropped.
pub fn extract_chromagram(
    samples: &[f32],
    sample_rate: u32,
    settings: &PipelineSettings,
    observer: &mut dyn PipelineObserver,
) -> Result<Vec<FrameChroma>, PipelineError> {
    let mut extractor = ChromaExtractor::new(sample_rate, settings.chroma);
    let checkpoint = settings.checkpoint_hops.max(1);
    let total = samples.len().max(1) as f32;

    let frame_count = if samples.len() >= FRAME_SIZE {
        (samples.len() - FRAME_SIZE) / HOP_SIZE + 1
    } else {
        0
    };
    let mut chromagram = Vec::with_capacity(frame_count);

    for frame_idx in 0..frame_count {
        if frame_idx % checkpoint == 0 {
            if observer.is_cancelled() {
                log::info!("Chroma extraction cancelled at frame {}/{}", frame_idx, frame_count);
                return Err(PipelineError::Cancelled);
            }
            let pos = frame_idx * HOP_SIZE;
            observer.progress(50.0 + (pos as f32 / total) * 40.0, "Listening...");
        }

        let start = frame_idx * HOP_SIZE;
        chromagram.push(extractor.extract(&samples[start..start + FRAME_SIZE]));
    }

    log::debug!(
        "Chromagram: {} frames, {} silent",
        chromagram.len(),
        chromagram.iter().filter(|c| **c == FrameChroma::Silent).count()
    );
    Ok(chromagram)
}

/// PCM and beat onsets in, one chord label per beat interval out.
///
/// Nothing is returned unless the whole run completes.
pub fn run_pipeline(
    samples: &[f32],
    sample_rate: u32,
    beats: &[f32],
    settings: &PipelineSettings,
    observer: &mut dyn PipelineObserver,
) -> Result<Vec<ChordLabel>, PipelineError> {
    if sample_rate == 0 {
        return Err(PipelineError::Analysis("sample rate is zero".into()));
    }
    if let Some(w) = beats.windows(2).find(|w| !(w[1] > w[0])) {
        return Err(PipelineError::Analysis(format!(
            "beat timestamps not strictly increasing: {} then {}",
            w[0], w[1]
        )));
    }

    let bank = TemplateBank::generic();
    let matcher = TemplateMatcher::new(&bank, settings.match_threshold);

    observer.progress(50.0, "Extracting Harmonics...");
    let chromagram = extract_chromagram(samples, sample_rate, settings, observer)?;

    if observer.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    observer.progress(95.0, "Syncing & Smoothing...");
    let labels = sync_chords(beats, &chromagram, sample_rate, &matcher, settings.smoothing);

    debug_assert_eq!(labels.len(), beats.len().saturating_sub(1));
    Ok(labels)
}
