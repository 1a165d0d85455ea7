//! JSON wire protocol spoken with the practice backend.
//!
//! Every frame is one JSON object with a `type` discriminator. Incoming
//! payloads are decoded leniently where the backend is known to omit
//! fields; anything that still fails to decode is dropped by the caller.

use std::collections::BTreeMap;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::workflow::InitStep;

/// Key number on the standard 0–127 MIDI scale.
pub type Note = u8;

pub const NOTE_MAX: Note = 127;

/// Velocity attached to notes played on the on-screen keyboard.
pub const VIRTUAL_VELOCITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(deserialize_with = "note")]
    pub low_note: Note,
    #[serde(deserialize_with = "note")]
    pub high_note: Note,
    pub key_count: u32,
}

impl DeviceConfig {
    /// True when `key_count` matches the note range it claims to cover.
    pub fn is_consistent(&self) -> bool {
        self.high_note >= self.low_note
            && (self.high_note - self.low_note) as u32 + 1 == self.key_count
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub octave: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub intervals: Vec<i32>,
    #[serde(default)]
    pub interval_labels: Option<Vec<String>>,
    #[serde(default)]
    pub note_names: Vec<String>,
    #[serde(default, deserialize_with = "notes")]
    pub midi_notes: Vec<Note>,
    #[serde(default)]
    pub historical_blurb: String,
}

impl Lesson {
    /// The first lesson note, used for the root indicator.
    pub fn root(&self) -> Option<Note> {
        self.midi_notes.first().copied()
    }

    pub fn contains(&self, note: Note) -> bool {
        self.midi_notes.contains(&note)
    }
}

/// Messages sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    VirtualNote {
        note: Note,
        on: bool,
        velocity: u8,
    },
    MidiDeviceSelect {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    NextLesson,
    SetVolume {
        value: f32,
    },
}

impl Command {
    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages pushed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Lesson {
        #[serde(default)]
        lesson: Option<Lesson>,
    },
    MidiDevices {
        #[serde(default, deserialize_with = "lenient")]
        devices: Vec<String>,
    },
    DeviceConfigs {
        #[serde(default)]
        configs: BTreeMap<String, DeviceConfig>,
    },
    MidiDevice {
        #[serde(rename = "deviceId", default)]
        device_id: Option<String>,
        #[serde(default)]
        config: Option<DeviceConfig>,
    },
    InitWorkflow {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    InitStep {
        #[serde(default, deserialize_with = "lenient")]
        step: Option<InitStep>,
    },
    InitComplete {
        config: DeviceConfig,
    },
    MidiNote {
        #[serde(deserialize_with = "note")]
        note: Note,
        on: bool,
        #[serde(rename = "isCorrect", default)]
        is_correct: bool,
    },
    Volume {
        #[serde(default, deserialize_with = "lenient")]
        value: Option<f32>,
    },
    Error {
        #[serde(default, deserialize_with = "lenient")]
        message: Option<String>,
    },
}

impl ServerEvent {
    /// Decode one frame. Unknown `type`s and malformed payloads are errors.
    pub fn decode(text: &str) -> anyhow::Result<ServerEvent> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Lesson { .. } => "lesson",
            ServerEvent::MidiDevices { .. } => "midi_devices",
            ServerEvent::DeviceConfigs { .. } => "device_configs",
            ServerEvent::MidiDevice { .. } => "midi_device",
            ServerEvent::InitWorkflow { .. } => "init_workflow",
            ServerEvent::InitStep { .. } => "init_step",
            ServerEvent::InitComplete { .. } => "init_complete",
            ServerEvent::MidiNote { .. } => "midi_note",
            ServerEvent::Volume { .. } => "volume",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Decode a field, falling back to its default when the value has the
/// wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn check_note<E: de::Error>(n: u8) -> Result<Note, E> {
    if n > NOTE_MAX {
        return Err(E::custom(format!("note {n} outside 0-{NOTE_MAX}")));
    }
    Ok(n)
}

fn note<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Note, D::Error> {
    check_note(u8::deserialize(deserializer)?)
}

fn notes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Note>, D::Error> {
    Vec::<u8>::deserialize(deserializer)?
        .into_iter()
        .map(check_note::<D::Error>)
        .collect()
}
