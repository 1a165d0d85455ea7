//! Client-side application state and the reducer that owns every mutation.
//!
//! `AppState::apply` is the only write path. It consumes one [`Action`],
//! mutates the state in place and returns the side effects (outgoing
//! commands, preference writes) for the caller to execute, so a transition
//! never performs IO itself and can never be interleaved with another.

use std::collections::BTreeMap;

use crate::keyboard::KeyRange;
use crate::protocol::{Command, DeviceConfig, Lesson, Note, ServerEvent, VIRTUAL_VELOCITY};
use crate::workflow::{self, InitWorkflow, Phase};

pub const DEFAULT_VOLUME: f32 = 0.8;

pub const DISCONNECTED_MESSAGE: &str = "Disconnected. Press Ctrl+R to reconnect.";
pub const TRANSPORT_ERROR_MESSAGE: &str = "Connection error.";
pub const DEFAULT_ERROR_MESSAGE: &str = "Error";

/// Lifecycle notifications from the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Opened,
    Errored,
    Closed,
}

/// Local user intents that do not originate from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SelectDevice(String),
    NextLesson,
    SetVolume(f32),
    SetShowRootIndicator(bool),
    ClearError,
    PressKey(Note),
    ReleaseKey(Note),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Connection(ConnectionStatus),
    Server(ServerEvent),
    Intent(Intent),
}

/// Work the dispatcher performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Command),
    PersistShowRootIndicator(bool),
}

/// Last known state of one key. Press state and correctness verdict always
/// arrive together, so they live in one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteState {
    pub active: bool,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub connected: bool,
    pub error: Option<String>,
    pub lesson: Option<Lesson>,
    pub devices: Vec<String>,
    pub device_configs: BTreeMap<String, DeviceConfig>,
    pub selected_device_id: Option<String>,
    pub selected_device_config: Option<DeviceConfig>,
    pub notes: BTreeMap<Note, NoteState>,
    pub volume: f32,
    pub show_root_indicator: bool,
    pub init_workflow: Option<InitWorkflow>,
}

/// What the status line shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus<'a> {
    Connecting,
    NoDevice,
    Device {
        id: &'a str,
        config: Option<&'a DeviceConfig>,
    },
}

impl std::fmt::Display for DeviceStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Connecting => write!(f, "Connecting…"),
            DeviceStatus::NoDevice => write!(f, "Select a MIDI device."),
            DeviceStatus::Device { id, config: None } => write!(f, "{id}"),
            DeviceStatus::Device {
                id,
                config: Some(c),
            } => write!(f, "{id} ({} keys, {}–{})", c.key_count, c.low_note, c.high_note),
        }
    }
}

/// Clamp a volume to `[0, 1]`; non-finite values are rejected.
pub fn clamp_volume(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

impl AppState {
    pub fn new(show_root_indicator: bool) -> Self {
        AppState {
            connected: false,
            error: None,
            lesson: None,
            devices: Vec::new(),
            device_configs: BTreeMap::new(),
            selected_device_id: None,
            selected_device_config: None,
            notes: BTreeMap::new(),
            volume: DEFAULT_VOLUME,
            show_root_indicator,
            init_workflow: None,
        }
    }

    pub fn apply(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::Connection(status) => {
                self.apply_connection(status);
                Vec::new()
            }
            Action::Server(event) => {
                self.apply_server(event);
                Vec::new()
            }
            Action::Intent(intent) => self.apply_intent(intent),
        }
    }

    fn apply_connection(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Opened => {
                self.connected = true;
                self.error = None;
            }
            ConnectionStatus::Errored => {
                self.error = Some(TRANSPORT_ERROR_MESSAGE.to_string());
            }
            ConnectionStatus::Closed => {
                self.connected = false;
                self.error = Some(DISCONNECTED_MESSAGE.to_string());
            }
        }
    }

    fn apply_server(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Lesson { lesson } => {
                self.lesson = lesson;
            }
            ServerEvent::MidiDevices { devices } => {
                self.devices = devices;
            }
            ServerEvent::DeviceConfigs { configs } => {
                for (id, config) in &configs {
                    warn_if_inconsistent(id, config);
                }
                self.device_configs = configs;
                self.selected_device_config =
                    self.known_config(self.selected_device_id.as_deref());
            }
            ServerEvent::MidiDevice { device_id, config } => {
                // A selection without an id cannot carry a config.
                let config = match (&device_id, config) {
                    (Some(id), Some(config)) => {
                        warn_if_inconsistent(id, &config);
                        self.device_configs.insert(id.clone(), config);
                        Some(config)
                    }
                    (Some(id), None) => self.known_config(Some(id)),
                    (None, _) => None,
                };
                self.selected_device_config = config;
                self.selected_device_id = device_id;
                self.init_workflow = None;
            }
            ServerEvent::InitWorkflow { device_id } => {
                self.init_workflow = Some(InitWorkflow::begin(device_id));
            }
            ServerEvent::InitStep { step } => {
                if let Some(wf) = self.init_workflow.as_mut() {
                    wf.advance(step);
                }
            }
            ServerEvent::InitComplete { config } => {
                let device_id = self
                    .init_workflow
                    .take()
                    .map(|wf| wf.device_id)
                    .filter(|id| !id.is_empty())
                    .or_else(|| self.selected_device_id.clone());
                let Some(device_id) = device_id else {
                    log::warn!("init_complete without a device to apply it to");
                    return;
                };
                warn_if_inconsistent(&device_id, &config);
                self.device_configs.insert(device_id.clone(), config);
                self.selected_device_id = Some(device_id);
                self.selected_device_config = Some(config);
            }
            ServerEvent::MidiNote {
                note,
                on,
                is_correct,
            } => {
                self.notes.insert(
                    note,
                    NoteState {
                        active: on,
                        correct: is_correct,
                    },
                );
            }
            ServerEvent::Volume { value } => {
                if let Some(v) = value.and_then(clamp_volume) {
                    self.volume = v;
                }
            }
            ServerEvent::Error { message } => {
                let message = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                self.error = Some(message);
            }
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Vec<Effect> {
        match intent {
            // Confirmation arrives as midi_device or init_workflow.
            Intent::SelectDevice(device_id) => {
                vec![Effect::Send(Command::MidiDeviceSelect { device_id })]
            }
            Intent::NextLesson => vec![Effect::Send(Command::NextLesson)],
            Intent::SetVolume(value) => match clamp_volume(value) {
                Some(v) => {
                    self.volume = v;
                    vec![Effect::Send(Command::SetVolume { value: v })]
                }
                None => Vec::new(),
            },
            Intent::SetShowRootIndicator(show) => {
                self.show_root_indicator = show;
                vec![Effect::PersistShowRootIndicator(show)]
            }
            Intent::ClearError => {
                self.error = None;
                Vec::new()
            }
            Intent::PressKey(note) => vec![Effect::Send(virtual_note(note, true))],
            Intent::ReleaseKey(note) => vec![Effect::Send(virtual_note(note, false))],
        }
    }

    fn known_config(&self, device_id: Option<&str>) -> Option<DeviceConfig> {
        device_id.and_then(|id| self.device_configs.get(id)).copied()
    }

    pub fn is_active(&self, note: Note) -> bool {
        self.notes.get(&note).is_some_and(|s| s.active)
    }

    /// The backend's last verdict for a note, if it ever sent one.
    pub fn is_correct(&self, note: Note) -> Option<bool> {
        self.notes.get(&note).map(|s| s.correct)
    }

    pub fn key_range(&self) -> KeyRange {
        KeyRange::for_device(self.selected_device_config.as_ref())
    }

    /// The note that carries the root indicator, when it is shown.
    pub fn root_indicator(&self) -> Option<Note> {
        if !self.show_root_indicator {
            return None;
        }
        self.lesson.as_ref().and_then(Lesson::root)
    }

    pub fn is_lesson_note(&self, note: Note) -> bool {
        self.lesson.as_ref().is_some_and(|l| l.contains(note))
    }

    pub fn workflow_phase(&self) -> Phase {
        workflow::phase(self.init_workflow.as_ref())
    }

    pub fn device_status(&self) -> DeviceStatus<'_> {
        match (&self.selected_device_id, self.connected) {
            (_, false) => DeviceStatus::Connecting,
            (None, true) => DeviceStatus::NoDevice,
            (Some(id), true) => DeviceStatus::Device {
                id: id.as_str(),
                config: self.selected_device_config.as_ref(),
            },
        }
    }

    /// Volume as a whole percentage for display.
    pub fn volume_percent(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }
}

fn virtual_note(note: Note, on: bool) -> Command {
    Command::VirtualNote {
        note,
        on,
        velocity: VIRTUAL_VELOCITY,
    }
}

fn warn_if_inconsistent(device_id: &str, config: &DeviceConfig) {
    if !config.is_consistent() {
        log::warn!(
            "Device '{device_id}' reports {} keys for range {}–{}; using the range",
            config.key_count,
            config.low_note,
            config.high_note
        );
    }
}
