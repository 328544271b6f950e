use std::fmt;

use serde::{Serialize, Serializer};

use super::chroma::{Chroma, PITCH_CLASSES};

pub const PITCH_CLASS_NAMES: [&str; PITCH_CLASSES] =
    ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

const ROOT_WEIGHT: f32 = 1.0;
const THIRD_WEIGHT: f32 = 0.6;
const FIFTH_WEIGHT: f32 = 0.8;

/// Octave-folded semitone, 0 = C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Wraps any index into 0..12.
    pub const fn from_index(idx: usize) -> Self {
        PitchClass((idx % PITCH_CLASSES) as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        PITCH_CLASS_NAMES[self.index()]
    }

    pub const fn transpose(self, semitones: usize) -> Self {
        Self::from_index(self.index() + semitones)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PitchClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChordQuality {
    Major,
    Minor,
}

impl ChordQuality {
    fn third(self) -> usize {
        match self {
            ChordQuality::Major => 4,
            ChordQuality::Minor => 3,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    pub root: PitchClass,
    pub quality: ChordQuality,
}

impl Chord {
    pub const fn new(root: PitchClass, quality: ChordQuality) -> Self {
        Self { root, quality }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality.suffix())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChordTemplate {
    pub chord: Chord,
    pub weights: Chroma,
}

impl ChordTemplate {
    pub fn triad(chord: Chord) -> Self {
        let mut weights = [0.0f32; PITCH_CLASSES];
        weights[chord.root.index()] = ROOT_WEIGHT;
        weights[chord.root.transpose(chord.quality.third()).index()] = THIRD_WEIGHT;
        weights[chord.root.transpose(7).index()] = FIFTH_WEIGHT;
        Self { chord, weights }
    }
}

/// Reference vectors searched by the matcher, in match-priority order.
#[derive(Clone, Debug)]
pub struct TemplateBank {
    templates: Vec<ChordTemplate>,
}

impl TemplateBank {
    /// Major and minor triads on every root: root ascending, major first.
    ///
    /// The bank is the same for every track. A detected key is reported
    /// alongside the chords but does not reweight these templates.
    pub fn generic() -> Self {
        let templates = (0..PITCH_CLASSES)
            .flat_map(|root| {
                let root = PitchClass::from_index(root);
                [ChordQuality::Major, ChordQuality::Minor]
                    .into_iter()
                    .map(move |quality| ChordTemplate::triad(Chord::new(root, quality)))
            })
            .collect();
        Self { templates }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChordTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[cfg(test)]
    pub fn get(&self, chord: Chord) -> Option<&ChordTemplate> {
        self.templates.iter().find(|t| t.chord == chord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_has_24_templates_in_priority_order() {
        let bank = TemplateBank::generic();
        assert_eq!(bank.len(), 24);
        let names: Vec<String> = bank.iter().take(4).map(|t| t.chord.to_string()).collect();
        assert_eq!(names, ["C", "Cm", "C#", "C#m"]);
        assert_eq!(bank.iter().last().unwrap().chord.to_string(), "Bm");
    }

    #[test]
    fn every_template_has_three_weighted_tones() {
        for template in TemplateBank::generic().iter() {
            let mut nonzero: Vec<f32> =
                template.weights.iter().copied().filter(|&w| w != 0.0).collect();
            nonzero.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(nonzero, vec![0.6, 0.8, 1.0], "{}", template.chord);
        }
    }

    #[test]
    fn triads_wrap_around_the_octave() {
        let a_minor =
            ChordTemplate::triad(Chord::new(PitchClass::from_index(9), ChordQuality::Minor));
        assert_eq!(a_minor.weights[9], 1.0); // A
        assert_eq!(a_minor.weights[0], 0.6); // C
        assert_eq!(a_minor.weights[4], 0.8); // E

        let b_major =
            ChordTemplate::triad(Chord::new(PitchClass::from_index(11), ChordQuality::Major));
        assert_eq!(b_major.weights[3], 0.6); // D#
        assert_eq!(b_major.weights[6], 0.8); // F#
    }

    #[test]
    fn chord_names() {
        let a_sharp_minor = Chord::new(PitchClass::from_index(10), ChordQuality::Minor);
        assert_eq!(a_sharp_minor.to_string(), "A#m");
        assert_eq!(PitchClass::from_index(14).name(), "D");
    }
}
