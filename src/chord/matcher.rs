use std::fmt;

use serde::{Serialize, Serializer};

use super::chroma::Chroma;
use super::templates::{Chord, TemplateBank};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.75;

/// What a beat resolves to after matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChordLabel {
    Chord(Chord),
    NoChord,
}

impl ChordLabel {
    pub fn is_chord(&self) -> bool {
        matches!(self, ChordLabel::Chord(_))
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordLabel::Chord(chord) => chord.fmt(f),
            ChordLabel::NoChord => f.write_str("-"),
        }
    }
}

impl Serialize for ChordLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn cosine_similarity(a: &Chroma, b: &Chroma) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    } else {
        0.0
    }
}

/// Classifies chroma vectors by cosine similarity against a template bank.
pub struct TemplateMatcher<'a> {
    bank: &'a TemplateBank,
    threshold: f32,
}

impl<'a> TemplateMatcher<'a> {
    pub fn new(bank: &'a TemplateBank, threshold: f32) -> Self {
        Self { bank, threshold }
    }

    /// Highest-scoring template. Ties keep the earlier template in bank
    /// order; `None` if nothing scores above zero.
    pub fn best_match(&self, chroma: &Chroma) -> Option<(Chord, f32)> {
        let mut best: Option<(Chord, f32)> = None;
        let mut best_score = 0.0f32;
        for template in self.bank.iter() {
            let score = cosine_similarity(chroma, &template.weights);
            if score > best_score {
                best_score = score;
                best = Some((template.chord, score));
            }
        }
        best
    }

    pub fn classify(&self, chroma: &Chroma) -> ChordLabel {
        match self.best_match(chroma) {
            Some((chord, score)) if score > self.threshold => ChordLabel::Chord(chord),
            _ => ChordLabel::NoChord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::templates::{ChordQuality, PitchClass};

    fn chord(root: usize, quality: ChordQuality) -> Chord {
        Chord::new(PitchClass::from_index(root), quality)
    }

    #[test]
    fn exact_template_matches_itself() {
        let bank = TemplateBank::generic();
        let matcher = TemplateMatcher::new(&bank, DEFAULT_MATCH_THRESHOLD);
        for template in bank.iter() {
            assert_eq!(matcher.classify(&template.weights), ChordLabel::Chord(template.chord));
        }
    }

    #[test]
    fn flat_chroma_is_no_chord() {
        let bank = TemplateBank::generic();
        let matcher = TemplateMatcher::new(&bank, DEFAULT_MATCH_THRESHOLD);
        // cos = 2.4 / (sqrt(12) * sqrt(2.0)) ≈ 0.49
        assert_eq!(matcher.classify(&[1.0; 12]), ChordLabel::NoChord);
    }

    #[test]
    fn zero_chroma_is_no_chord() {
        let bank = TemplateBank::generic();
        let matcher = TemplateMatcher::new(&bank, DEFAULT_MATCH_THRESHOLD);
        assert!(matcher.best_match(&[0.0; 12]).is_none());
        assert_eq!(matcher.classify(&[0.0; 12]), ChordLabel::NoChord);
    }

    #[test]
    fn score_at_threshold_is_rejected() {
        let bank = TemplateBank::generic();
        let c_major = bank.get(chord(0, ChordQuality::Major)).unwrap().weights;
        let score = cosine_similarity(&c_major, &c_major);

        let at = TemplateMatcher::new(&bank, score);
        assert_eq!(at.classify(&c_major), ChordLabel::NoChord);

        let below = TemplateMatcher::new(&bank, score - 1e-3);
        assert_eq!(below.classify(&c_major), ChordLabel::Chord(chord(0, ChordQuality::Major)));
    }

    #[test]
    fn ties_keep_first_template() {
        let bank = TemplateBank::generic();
        let matcher = TemplateMatcher::new(&bank, 0.0);
        // Root and fifth only: C and Cm score identically
        let mut power = [0.0f32; 12];
        power[0] = 1.0;
        power[7] = 0.8;
        let (best, _) = matcher.best_match(&power).unwrap();
        assert_eq!(best, chord(0, ChordQuality::Major));
    }

    #[test]
    fn labels_render_as_names() {
        assert_eq!(ChordLabel::NoChord.to_string(), "-");
        assert_eq!(ChordLabel::Chord(chord(10, ChordQuality::Minor)).to_string(), "A#m");
        assert_eq!(serde_json::to_string(&ChordLabel::NoChord).unwrap(), "\"-\"");
    }
}
