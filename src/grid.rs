//! Measure layout of a per-beat chord sequence.
//!
//! The grid offset is a pure display transform: it pads or trims the front
//! of the displayed sequence and never touches the labels themselves.

use std::fmt::Write as _;

use crate::chord::matcher::ChordLabel;

pub const DEFAULT_BEATS_PER_MEASURE: usize = 4;
const CELL_WIDTH: usize = 6;

/// A run of displayed beats drawn as one box.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub label: ChordLabel,
    /// Position of the first covered entry in the displayed sequence.
    pub display_index: usize,
    /// Underlying beat of the first covered entry; `None` for padding.
    pub beat: Option<usize>,
    /// Number of beats covered.
    pub width: usize,
}

impl Span {
    pub fn covers(&self, beat: usize) -> bool {
        self.beat.is_some_and(|first| beat >= first && beat < first + self.width)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Measure {
    /// 1-based bar number.
    pub number: usize,
    pub spans: Vec<Span>,
}

/// Labels as displayed under `offset`: positive pads the front with
/// `NoChord`, negative drops that many leading labels.
pub fn display_sequence(chords: &[ChordLabel], offset: i32) -> Vec<ChordLabel> {
    let magnitude = offset.unsigned_abs() as usize;
    if offset >= 0 {
        let mut view = vec![ChordLabel::NoChord; magnitude];
        view.extend_from_slice(chords);
        view
    } else {
        chords.iter().skip(magnitude).copied().collect()
    }
}

/// Beat behind a displayed position, if it maps onto a real label.
pub fn beat_index(display_index: usize, offset: i32, chord_count: usize) -> Option<usize> {
    let idx = display_index as i64 - offset as i64;
    if idx >= 0 && (idx as usize) < chord_count {
        Some(idx as usize)
    } else {
        None
    }
}

/// Groups the displayed sequence into measures, padding the last one.
///
/// A measure of identical real chords collapses into a single span.
pub fn layout(chords: &[ChordLabel], offset: i32, beats_per_measure: usize) -> Vec<Measure> {
    let per_measure = beats_per_measure.max(1);
    let view = display_sequence(chords, offset);

    view.chunks(per_measure)
        .enumerate()
        .map(|(m, chunk)| {
            let start = m * per_measure;
            let mut entries = chunk.to_vec();
            entries.resize(per_measure, ChordLabel::NoChord);

            let first = entries[0];
            let merged = first.is_chord() && entries.iter().all(|c| *c == first);

            let spans = if merged {
                vec![Span {
                    label: first,
                    display_index: start,
                    beat: beat_index(start, offset, chords.len()),
                    width: per_measure,
                }]
            } else {
                entries
                    .iter()
                    .enumerate()
                    .map(|(k, label)| Span {
                        label: *label,
                        display_index: start + k,
                        beat: beat_index(start + k, offset, chords.len()),
                        width: 1,
                    })
                    .collect()
            };

            Measure {
                number: m + 1,
                spans,
            }
        })
        .collect()
}

/// Playback position a span seeks to.
pub fn seek_time(beats: &[f32], span: &Span) -> Option<f32> {
    span.beat.and_then(|b| beats.get(b).copied())
}

/// Greatest `i` with `t >= beats[i]`.
pub fn active_beat(beats: &[f32], t: f32) -> Option<usize> {
    let mut active = None;
    for (i, &b) in beats.iter().enumerate() {
        if t >= b {
            active = Some(i);
        } else {
            break;
        }
    }
    active
}

/// Tracks the sounding beat during playback, reporting only changes.
#[derive(Debug, Default)]
pub struct BeatCursor {
    current: Option<usize>,
}

impl BeatCursor {
    /// `Some(new)` when the sounding beat differs from the last update.
    pub fn update(&mut self, beats: &[f32], t: f32) -> Option<Option<usize>> {
        let beat = active_beat(beats, t);
        if beat == self.current {
            return None;
        }
        self.current = beat;
        Some(beat)
    }
}

/// Playback positions, every `step` seconds from 0 through `duration`, at
/// which the highlighted beat changes, with the beat it changes to.
pub fn highlight_changes(beats: &[f32], duration: f32, step: f32) -> Vec<(f32, Option<usize>)> {
    let mut changes = Vec::new();
    if !(step > 0.0) {
        return changes;
    }

    let mut cursor = BeatCursor::default();
    for tick in 0u64.. {
        let t = tick as f32 * step;
        if t > duration {
            break;
        }
        if let Some(beat) = cursor.update(beats, t) {
            changes.push((t, beat));
        }
    }
    changes
}

/// Plain-text grid, `measures_per_row` bars per line. The span covering
/// `active` is bracketed.
pub fn render_text(measures: &[Measure], active: Option<usize>, measures_per_row: usize) -> String {
    let mut out = String::new();
    for row in measures.chunks(measures_per_row.max(1)) {
        for measure in row {
            let _ = write!(out, "|{:<4}", measure.number);
            for span in &measure.spans {
                let text = match span.label {
                    ChordLabel::NoChord => "-".to_string(),
                    label => label.to_string(),
                };
                let text = match active {
                    Some(beat) if span.covers(beat) => format!("[{}]", text),
                    _ => text,
                };
                let _ = write!(out, "{:<width$}", text, width = CELL_WIDTH * span.width);
            }
        }
        out.push_str("|\n");
    }
    out
}
