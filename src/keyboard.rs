use crate::protocol::{DeviceConfig, Note};

/// Lowest note of a standard 88-key piano (A0).
pub const DEFAULT_LOW: Note = 21;
/// Highest note of a standard 88-key piano (C8).
pub const DEFAULT_HIGH: Note = 108;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch class of a note (0 = C … 11 = B).
pub fn pitch_class(note: Note) -> u8 {
    note % 12
}

/// Octave number in scientific pitch notation (note 60 is octave 4).
pub fn octave(note: Note) -> i8 {
    (note / 12) as i8 - 1
}

/// Display name such as `C4` or `F#-1`.
pub fn note_name(note: Note) -> String {
    format!("{}{}", PITCH_CLASSES[pitch_class(note) as usize], octave(note))
}

pub fn is_black(note: Note) -> bool {
    matches!(pitch_class(note), 1 | 3 | 6 | 8 | 10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColor {
    White,
    Black,
}

pub fn key_color(note: Note) -> KeyColor {
    if is_black(note) {
        KeyColor::Black
    } else {
        KeyColor::White
    }
}

/// An inclusive range of visible keys.
///
/// An inverted range (`low > high`) is empty rather than an error: device
/// configs are stored as the backend sent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub low: Note,
    pub high: Note,
}

/// Visible notes split by key color, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyLayout {
    pub white: Vec<Note>,
    pub black: Vec<Note>,
}

impl KeyRange {
    pub const DEFAULT: KeyRange = KeyRange {
        low: DEFAULT_LOW,
        high: DEFAULT_HIGH,
    };

    pub fn new(low: Note, high: Note) -> Self {
        KeyRange { low, high }
    }

    /// The range of the selected device, or the 88-key default when no
    /// device config is known.
    pub fn for_device(config: Option<&DeviceConfig>) -> Self {
        match config {
            Some(c) => KeyRange::new(c.low_note, c.high_note),
            None => KeyRange::DEFAULT,
        }
    }

    pub fn key_count(&self) -> usize {
        if self.low > self.high {
            0
        } else {
            (self.high - self.low) as usize + 1
        }
    }

    pub fn contains(&self, note: Note) -> bool {
        (self.low..=self.high).contains(&note)
    }

    pub fn notes(&self) -> impl Iterator<Item = Note> {
        self.low..=self.high
    }

    /// Number of white keys in the range strictly below `note`.
    pub fn white_keys_below(&self, note: Note) -> usize {
        (self.low..note.min(self.high.saturating_add(1)))
            .filter(|&n| !is_black(n))
            .count()
    }

    /// Horizontal anchor of a black key: the count of visible white keys
    /// strictly below its left (white) neighbour, i.e. that neighbour's index
    /// in the white row. `None` for white keys, for notes outside the range,
    /// and for a black key whose left neighbour is not visible.
    pub fn black_key_anchor(&self, note: Note) -> Option<usize> {
        if !is_black(note) || !self.contains(note) || note == self.low {
            return None;
        }
        Some(self.white_keys_below(note - 1))
    }

    pub fn layout(&self) -> KeyLayout {
        let (white, black) = self.notes().partition(|&n| !is_black(n));
        KeyLayout { white, black }
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        KeyRange::DEFAULT
    }
}

impl std::fmt::Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} keys ({}–{})", self.key_count(), self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_of_reference_notes() {
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(108), "C8");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn pitch_class_and_octave_repeat_every_twelve() {
        for n in 0..=115u8 {
            assert_eq!(pitch_class(n), pitch_class(n + 12));
            assert_eq!(octave(n) + 1, octave(n + 12));
            assert_eq!(is_black(n), is_black(n + 12));
        }
        assert_eq!(octave(11), -1);
        assert_eq!(octave(12), 0);
    }

    #[test]
    fn names_are_deterministic() {
        for n in 0..=127u8 {
            assert_eq!(note_name(n), note_name(n));
        }
    }

    #[test]
    fn black_keys_by_pitch_class() {
        let black: Vec<u8> = (60..72).filter(|&n| is_black(n)).collect();
        assert_eq!(black, vec![61, 63, 66, 68, 70]);
        assert_eq!(key_color(60), KeyColor::White);
        assert_eq!(key_color(61), KeyColor::Black);
    }

    #[test]
    fn default_range_is_88_keys() {
        let range = KeyRange::for_device(None);
        assert_eq!(range, KeyRange::new(21, 108));
        assert_eq!(range.key_count(), 88);
        let layout = range.layout();
        assert_eq!(layout.white.len(), 52);
        assert_eq!(layout.black.len(), 36);
    }

    #[test]
    fn device_range_replaces_default() {
        let config = DeviceConfig {
            low_note: 36,
            high_note: 96,
            key_count: 61,
        };
        let range = KeyRange::for_device(Some(&config));
        assert_eq!(range.key_count(), 61);
        assert_eq!(range.layout().white.first(), Some(&36));
        assert_eq!(range.layout().white.last(), Some(&96));
    }

    #[test]
    fn layout_partitions_range_in_order() {
        for (low, high) in [(21, 108), (36, 96), (48, 72), (22, 30), (0, 127), (61, 61)] {
            let range = KeyRange::new(low, high);
            let layout = range.layout();
            assert!(layout.white.windows(2).all(|w| w[0] < w[1]));
            assert!(layout.black.windows(2).all(|w| w[0] < w[1]));
            let mut all: Vec<u8> = layout.white.iter().chain(&layout.black).copied().collect();
            all.sort_unstable();
            assert_eq!(all, range.notes().collect::<Vec<_>>());
        }
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = KeyRange::new(60, 48);
        assert_eq!(range.key_count(), 0);
        assert_eq!(range.layout(), KeyLayout::default());
    }

    #[test]
    fn black_key_anchor_counts_whites_below_left_neighbour() {
        let range = KeyRange::new(36, 96);
        // C#2: left neighbour C2 is the first white key.
        assert_eq!(range.black_key_anchor(37), Some(0));
        // D#2: left neighbour D2 is the second white key.
        assert_eq!(range.black_key_anchor(39), Some(1));
        // F#2: C D E below F.
        assert_eq!(range.black_key_anchor(42), Some(3));
        // C#3 sits one octave (7 whites) further.
        assert_eq!(range.black_key_anchor(49), Some(7));
        assert_eq!(range.black_key_anchor(36), None);
    }

    #[test]
    fn anchor_is_relative_to_range_low() {
        let full = KeyRange::DEFAULT;
        // A#0: left neighbour A0 is the lowest key.
        assert_eq!(full.black_key_anchor(22), Some(0));
        // C#4 on an 88-key piano: 23 white keys from A0 up to C4.
        assert_eq!(full.black_key_anchor(61), Some(23));
        let upper = KeyRange::new(60, 72);
        assert_eq!(upper.black_key_anchor(61), Some(0));
    }

    #[test]
    fn black_key_at_range_start_has_no_anchor() {
        let range = KeyRange::new(22, 30);
        assert_eq!(range.black_key_anchor(22), None);
        assert_eq!(range.black_key_anchor(25), Some(1));
    }
}
