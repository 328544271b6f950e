use std::fmt;

use serde::Serialize;

use crate::audio::beats::{BeatGrid, BeatTracker, FALLBACK_BPM};
use crate::audio::decode::AudioData;
use crate::audio::key::{DetectedKey, KeyDetector};
use crate::chord::matcher::ChordLabel;
use crate::chord::pipeline::{run_pipeline, PipelineError, PipelineObserver, PipelineSettings};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tempo {
    Detected(f32),
    /// No usable beats; the grid is synthetic.
    Estimated,
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tempo::Detected(bpm) => write!(f, "{}", bpm.round() as i64),
            Tempo::Estimated => write!(f, "{} (Est)", FALLBACK_BPM as i64),
        }
    }
}

/// Everything one analysis run produces, plus the user's grid alignment.
#[derive(Clone, Debug)]
pub struct Session {
    pub beats: Vec<f32>,
    pub tempo: Tempo,
    pub key: Option<DetectedKey>,
    /// One label per beat interval.
    pub chords: Vec<ChordLabel>,
    pub offset: i32,
}

impl Session {
    /// Runs beat tracking, key detection and chord estimation over `audio`.
    ///
    /// The session is only built once every stage has finished, so a
    /// cancelled or failed run leaves no partial result behind.
    pub fn analyze(
        audio: &AudioData,
        tracker: &dyn BeatTracker,
        key_detector: &dyn KeyDetector,
        settings: &PipelineSettings,
        observer: &mut dyn PipelineObserver,
    ) -> Result<Session, PipelineError> {
        observer.progress(30.0, "Analyzing Structure...");

        let detected = tracker.detect(&audio.samples, audio.sample_rate);
        let fallback = !detected.is_usable();
        let (grid, tempo) = if fallback {
            log::warn!(
                "Beat tracker returned {} beat(s); using a synthetic grid",
                detected.beats.len()
            );
            (BeatGrid::synthetic(audio.duration()), Tempo::Estimated)
        } else {
            let bpm = detected.bpm;
            (detected, Tempo::Detected(bpm))
        };
        log::info!("Beats: {}, tempo: {}", grid.beats.len(), tempo);

        if observer.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let key = key_detector.detect(&audio.samples, audio.sample_rate);
        match key {
            Some(k) => log::info!("Key: {} (score {:.2})", k, k.score),
            None => log::info!("Key: undetermined"),
        }

        let chords = if fallback {
            vec![ChordLabel::NoChord; grid.beats.len().saturating_sub(1)]
        } else {
            run_pipeline(&audio.samples, audio.sample_rate, &grid.beats, settings, observer)?
        };

        Ok(Session {
            beats: grid.beats,
            tempo,
            key,
            chords,
            offset: 0,
        })
    }

    /// Moves the grid alignment by `delta` beats. Ignored when there are no
    /// beats to align.
    pub fn shift(&mut self, delta: i32) -> bool {
        if self.beats.is_empty() {
            return false;
        }
        self.offset += delta;
        true
    }

    pub fn export(&self) -> SessionExport<'_> {
        SessionExport {
            bpm: self.tempo.to_string(),
            key: self.key.map(|k| k.to_string()),
            offset: self.offset,
            beats: &self.beats,
            chords: &self.chords,
        }
    }
}

/// Flat JSON form of a session.
#[derive(Debug, Serialize)]
pub struct SessionExport<'a> {
    pub bpm: String,
    pub key: Option<String>,
    pub offset: i32,
    pub beats: &'a [f32],
    pub chords: &'a [ChordLabel],
}
