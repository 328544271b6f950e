//! Beat-synchronous chord estimation.
//!
//! Frame chromas are averaged over each beat interval, blended with the
//! previous beat, matched against the template bank, and finally cleaned of
//! one-beat glitches.

use super::chroma::{Chroma, FrameChroma, HOP_SIZE, PITCH_CLASSES};
use super::matcher::{ChordLabel, TemplateMatcher};

/// Weight of the current beat in the beat-to-beat blend.
pub const DEFAULT_SMOOTHING: f32 = 0.7;

/// Frame-index range `[start, end)` covered by a beat interval.
pub fn frame_bounds(start: f32, end: f32, sample_rate: u32) -> (usize, usize) {
    let frame_duration = HOP_SIZE as f64 / sample_rate as f64;
    let to_frame = |t: f32| (t.max(0.0) as f64 / frame_duration).floor() as usize;
    (to_frame(start), to_frame(end))
}

/// Mean voiced chroma per beat interval; `beats.len() - 1` entries.
///
/// Silent frames are skipped, and an interval with no voiced frames (or one
/// lying past the end of the chromagram) is silent.
pub fn beat_chromas(
    beats: &[f32],
    chromagram: &[FrameChroma],
    sample_rate: u32,
) -> Vec<FrameChroma> {
    beats
        .windows(2)
        .map(|w| {
            let (start, end) = frame_bounds(w[0], w[1], sample_rate);
            let end = end.min(chromagram.len());
            let start = start.min(end);

            let mut sum = [0.0f32; PITCH_CLASSES];
            let mut count = 0usize;
            for chroma in chromagram[start..end].iter().filter_map(FrameChroma::voiced) {
                for (acc, v) in sum.iter_mut().zip(chroma) {
                    *acc += v;
                }
                count += 1;
            }

            if count == 0 {
                FrameChroma::Silent
            } else {
                sum.iter_mut().for_each(|v| *v /= count as f32);
                FrameChroma::Voiced(sum)
            }
        })
        .collect()
}

/// Exponential blend across beats: `weight * current + (1 - weight) * previous`.
///
/// History restarts from zero after every silent beat.
pub fn smooth(beats: &[FrameChroma], weight: f32) -> Vec<FrameChroma> {
    let mut prev: Chroma = [0.0; PITCH_CLASSES];
    beats
        .iter()
        .map(|beat| match beat {
            FrameChroma::Silent => {
                prev = [0.0; PITCH_CLASSES];
                FrameChroma::Silent
            }
            FrameChroma::Voiced(curr) => {
                let mut blended = [0.0f32; PITCH_CLASSES];
                for k in 0..PITCH_CLASSES {
                    blended[k] = curr[k] * weight + prev[k] * (1.0 - weight);
                }
                prev = blended;
                FrameChroma::Voiced(blended)
            }
        })
        .collect()
}

pub fn match_beats(beats: &[FrameChroma], matcher: &TemplateMatcher<'_>) -> Vec<ChordLabel> {
    beats
        .iter()
        .map(|beat| match beat {
            FrameChroma::Silent => ChordLabel::NoChord,
            FrameChroma::Voiced(chroma) => matcher.classify(chroma),
        })
        .collect()
}

/// Replaces every A-B-A with A-A-A.
///
/// Neighbours are read from the input, not from labels already rewritten in
/// this pass, so alternating runs like A-B-A-B-A become A-A-B-A-A.
pub fn remove_glitches(labels: &[ChordLabel]) -> Vec<ChordLabel> {
    let mut out = labels.to_vec();
    for i in 1..labels.len().saturating_sub(1) {
        let (prev, curr, next) = (labels[i - 1], labels[i], labels[i + 1]);
        if prev == next && curr != prev {
            out[i] = prev;
        }
    }
    out
}

/// Full per-beat chain from a chromagram to glitch-filtered labels.
pub fn sync_chords(
    beats: &[f32],
    chromagram: &[FrameChroma],
    sample_rate: u32,
    matcher: &TemplateMatcher<'_>,
    smoothing: f32,
) -> Vec<ChordLabel> {
    let averaged = beat_chromas(beats, chromagram, sample_rate);
    let smoothed = smooth(&averaged, smoothing);
    let raw = match_beats(&smoothed, matcher);
    log::debug!(
        "Synced {} beats ({} silent)",
        raw.len(),
        smoothed.iter().filter(|b| **b == FrameChroma::Silent).count()
    );
    remove_glitches(&raw)
}
