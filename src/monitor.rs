use std::time::{Duration, Instant};

use crate::app::App;
use crate::cli::MonitorArgs;
use crate::keyboard::{KeyColor, KeyRange, key_color, note_name};
use crate::store::{Action, AppState, Intent};
use crate::workflow::Phase;

/// The parts of the state worth reporting, in a comparable form.
#[derive(Debug, Default, PartialEq)]
struct Snapshot {
    connected: bool,
    error: Option<String>,
    devices: Vec<String>,
    device: String,
    lesson: Option<String>,
    volume: u32,
    phase: Option<String>,
    active: Vec<String>,
}

impl Snapshot {
    fn of(state: &AppState) -> Self {
        Snapshot {
            connected: state.connected,
            error: state.error.clone(),
            devices: state.devices.clone(),
            device: state.device_status().to_string(),
            lesson: state
                .lesson
                .as_ref()
                .map(|l| format!("{} {} ({})", l.key, l.name, l.note_names.join(" "))),
            volume: state.volume_percent(),
            phase: match (&state.init_workflow, state.workflow_phase()) {
                (Some(wf), Phase::AwaitingLow | Phase::AwaitingHigh) => {
                    let (step, total) = wf.progress();
                    Some(format!("{} [{step}/{total}] {}", wf.device_id, wf.prompt()))
                }
                _ => None,
            },
            active: state
                .notes
                .iter()
                .filter(|(_, s)| s.active)
                .map(|(&n, s)| format!("{}{}", note_name(n), if s.correct { "✓" } else { "✗" }))
                .collect(),
        }
    }

    fn log_changes(&self, old: &Snapshot) {
        if self.connected != old.connected {
            log::info!("connected: {}", self.connected);
        }
        if self.error != old.error {
            match &self.error {
                Some(e) => log::warn!("error: {e}"),
                None => log::info!("error cleared"),
            }
        }
        if self.devices != old.devices {
            log::info!("devices: [{}]", self.devices.join(", "));
        }
        if self.device != old.device {
            log::info!("device: {}", self.device);
        }
        if self.lesson != old.lesson {
            log::info!("lesson: {}", self.lesson.as_deref().unwrap_or("(none)"));
        }
        if self.volume != old.volume {
            log::info!("volume: {}%", self.volume);
        }
        if self.phase != old.phase {
            log::info!("setup: {}", self.phase.as_deref().unwrap_or("done"));
        }
        if self.active != old.active {
            log::info!("held: [{}]", self.active.join(" "));
        }
    }
}

/// Connect, run the requested one-shot intents once the socket is open, and
/// log state changes until the server closes or the time runs out.
pub fn run(mut app: App, args: MonitorArgs) -> anyhow::Result<()> {
    log::info!("Connecting to {}", app.url());
    app.connect()?;

    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut last = Snapshot::of(app.state());
    let mut requested = false;

    while app.is_connection_live() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Time is up");
            break;
        }
        app.pump_timeout(Duration::from_millis(100));

        if app.state().connected && !requested {
            requested = true;
            if let Some(device) = &args.device {
                app.dispatch(Action::Intent(Intent::SelectDevice(device.clone())));
            }
            if args.next_lesson {
                app.dispatch(Action::Intent(Intent::NextLesson));
            }
        }

        let now = Snapshot::of(app.state());
        now.log_changes(&last);
        last = now;
    }

    app.disconnect();
    Ok(())
}

/// One line per key: note number, name, color and, for black keys, the
/// index of the white key it sits on.
pub fn layout_lines(range: KeyRange) -> Vec<String> {
    range
        .notes()
        .map(|note| {
            let name = note_name(note);
            match key_color(note) {
                KeyColor::White => {
                    format!("{note:>3}  {name:<4}  white  #{}", range.white_keys_below(note))
                }
                KeyColor::Black => match range.black_key_anchor(note) {
                    Some(anchor) => format!("{note:>3}  {name:<4}  black  after #{anchor}"),
                    None => format!("{note:>3}  {name:<4}  black  (edge)"),
                },
            }
        })
        .collect()
}

pub fn layout(range: KeyRange) {
    let keys = range.layout();
    println!("=== {range} ===");
    println!(
        "  {} white, {} black",
        keys.white.len(),
        keys.black.len()
    );
    if range.key_count() == 0 {
        println!("  (empty)");
        return;
    }
    for line in layout_lines(range) {
        println!("  {line}");
    }
}
