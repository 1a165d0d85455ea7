use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::keyboard::note_name;
use crate::protocol::{NOTE_MAX, Note};
use crate::store::Intent;

/// Computer-keyboard piano using the Amiga tracker layout.
///
/// Key releases are only reported by terminals that speak the Kitty keyboard
/// protocol; elsewhere the piano stays disabled so notes cannot get stuck.
pub struct VirtualPiano {
    base_octave: i8,
    /// Held keys and the note each one started, so an octave change while
    /// a key is down still releases the right note.
    held_keys: HashMap<KeyCode, Note>,
    enabled: bool,
}

impl VirtualPiano {
    pub fn new(enabled: bool) -> Self {
        VirtualPiano {
            base_octave: 4,
            held_keys: HashMap::new(),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_octave(&self) -> i8 {
        self.base_octave
    }

    /// Translate a key event into a key press or release intent. Keys with
    /// Ctrl or Alt held are left to the caller.
    pub fn handle_key_event(&mut self, event: KeyEvent) -> Option<Intent> {
        if !self.enabled || event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return None;
        }
        let code = normalize(event.code);

        match event.kind {
            KeyEventKind::Press => {
                match code {
                    KeyCode::Char('[') => {
                        if self.base_octave > 0 {
                            self.base_octave -= 1;
                            log::info!("Piano: octave down → {}", self.base_octave);
                        }
                        return None;
                    }
                    KeyCode::Char(']') => {
                        if self.base_octave < 8 {
                            self.base_octave += 1;
                            log::info!("Piano: octave up → {}", self.base_octave);
                        }
                        return None;
                    }
                    _ => {}
                }

                if self.held_keys.contains_key(&code) {
                    return None;
                }
                let note = self.key_to_note(code)?;
                self.held_keys.insert(code, note);
                log::debug!("Piano: press {note} ({})", note_name(note));
                Some(Intent::PressKey(note))
            }
            KeyEventKind::Release => {
                let note = self.held_keys.remove(&code)?;
                log::debug!("Piano: release {note} ({})", note_name(note));
                Some(Intent::ReleaseKey(note))
            }
            KeyEventKind::Repeat => None,
        }
    }

    /// Release intents for every key still held.
    pub fn all_notes_off(&mut self) -> Vec<Intent> {
        self.held_keys
            .drain()
            .map(|(_, note)| Intent::ReleaseKey(note))
            .collect()
    }

    fn key_to_note(&self, code: KeyCode) -> Option<Note> {
        let KeyCode::Char(c) = code else {
            return None;
        };
        let (semitone_offset, octave_offset) = match c {
            // Lower row: base octave
            'z' => (0, 0),
            's' => (1, 0),
            'x' => (2, 0),
            'd' => (3, 0),
            'c' => (4, 0),
            'v' => (5, 0),
            'g' => (6, 0),
            'b' => (7, 0),
            'h' => (8, 0),
            'n' => (9, 0),
            'j' => (10, 0),
            'm' => (11, 0),
            ',' => (12, 0),
            'l' => (13, 0),
            '.' => (14, 0),
            ';' => (15, 0),
            '/' => (16, 0),

            // Upper row: base octave + 1
            'q' => (0, 1),
            '2' => (1, 1),
            'w' => (2, 1),
            '3' => (3, 1),
            'e' => (4, 1),
            'r' => (5, 1),
            '5' => (6, 1),
            't' => (7, 1),
            '6' => (8, 1),
            'y' => (9, 1),
            '7' => (10, 1),
            'u' => (11, 1),
            'i' => (12, 1),
            '9' => (13, 1),
            'o' => (14, 1),
            '0' => (15, 1),
            'p' => (16, 1),

            _ => return None,
        };

        // Octave -1 starts at note 0, so octave n starts at (n + 1) * 12.
        let note = (self.base_octave as i16 + 1 + octave_offset) * 12 + semitone_offset;
        (0..=NOTE_MAX as i16).contains(&note).then_some(note as Note)
    }
}

fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}
