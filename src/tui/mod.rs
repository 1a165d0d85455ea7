use std::io;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEventKind,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use view::{
    BlackKey, KeyCell, KeyGeometry, KeyHit, List, ListItem, ListState, PianoKeys, centered_rect,
};

use crate::app::App;
use crate::keyboard::{KeyRange, note_name};
use crate::piano::VirtualPiano;
use crate::protocol::{Lesson, Note};
use crate::store::{Action, AppState, Intent};
use crate::workflow::Phase;

const ROOT_MARKER: char = '●';
const VOLUME_STEP: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BarAction {
    Devices,
    NextLesson,
    Louder,
    Quieter,
    Root,
    Reconnect,
    Quit,
}

const ACTIONS: &[(&str, &str, BarAction)] = &[
    ("^D", "Devices", BarAction::Devices),
    ("^N", "Next lesson", BarAction::NextLesson),
    ("↑", "Louder", BarAction::Louder),
    ("↓", "Quieter", BarAction::Quieter),
    ("^T", "Root", BarAction::Root),
    ("^R", "Reconnect", BarAction::Reconnect),
    ("^Q", "Quit", BarAction::Quit),
];

#[derive(Default)]
struct Areas {
    keys: Rect,
    devices: Rect,
    action_bar: Rect,
}

struct Tui {
    app: App,
    piano: VirtualPiano,
    /// Open device selector, if any.
    devices: Option<ListState>,
    hover: Option<Note>,
    /// Key held with the mouse.
    pointer_held: Option<Note>,
    areas: Areas,
    quit: bool,
}

impl Tui {
    fn intent(&mut self, intent: Intent) {
        self.app.dispatch(Action::Intent(intent));
    }

    fn release_all(&mut self) {
        for intent in self.piano.all_notes_off() {
            self.intent(intent);
        }
        if let Some(note) = self.pointer_held.take() {
            self.intent(Intent::ReleaseKey(note));
        }
    }

    fn reconnect(&mut self) {
        self.release_all();
        self.devices = None;
        self.hover = None;
        if let Err(e) = self.app.reconnect() {
            log::error!("Reconnect failed: {e}");
        }
    }

    fn change_volume(&mut self, steps: f32) {
        let value = step_volume(self.app.state().volume, steps);
        self.intent(Intent::SetVolume(value));
    }

    fn toggle_root_indicator(&mut self) {
        let show = !self.app.state().show_root_indicator;
        self.intent(Intent::SetShowRootIndicator(show));
    }

    fn open_devices(&mut self) {
        let state = self.app.state();
        let mut list = ListState::new(state.devices.len());
        if let Some(i) = state
            .selected_device_id
            .as_ref()
            .and_then(|id| state.devices.iter().position(|d| d == id))
        {
            list.select(i);
        }
        self.devices = Some(list);
    }

    fn confirm_device(&mut self, index: usize) {
        self.devices = None;
        if let Some(id) = self.app.state().devices.get(index).cloned() {
            log::info!("Selecting device {id}");
            self.intent(Intent::SelectDevice(id));
        }
    }

    fn run_action(&mut self, action: BarAction) {
        match action {
            BarAction::Devices => self.open_devices(),
            BarAction::NextLesson => self.intent(Intent::NextLesson),
            BarAction::Louder => self.change_volume(1.0),
            BarAction::Quieter => self.change_volume(-1.0),
            BarAction::Root => self.toggle_root_indicator(),
            BarAction::Reconnect => self.reconnect(),
            BarAction::Quit => self.quit = true,
        }
    }

    /// Keep the selector in step with the device list, which can change
    /// while it is open.
    fn sync_devices(&mut self) {
        let len = self.app.state().devices.len();
        if let Some(list) = self.devices.as_mut() {
            list.set_len(len);
        }
    }

    fn key_at(&self, x: u16, y: u16) -> Option<Note> {
        let range = self.app.state().key_range();
        let keys = range.layout();
        let anchors: Vec<_> = keys.black.iter().map(|&n| range.black_key_anchor(n)).collect();
        let geo = KeyGeometry::new(self.areas.keys, keys.white.len());
        match geo.hit(x, y, keys.white.len(), &anchors)? {
            KeyHit::White(i) => keys.white.get(i).copied(),
            KeyHit::Black(i) => keys.black.get(i).copied(),
        }
    }
}

pub fn run(mut app: App) -> anyhow::Result<()> {
    // Probe keyboard enhancement support (must be done before entering raw mode)
    let kitty_supported = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);

    log::info!("Connecting to {}", app.url());
    app.connect()?;

    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    if kitty_supported {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    | KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            )
        )?;
        log::info!("Kitty keyboard protocol enabled (press/release detection active)");
    } else {
        log::warn!("Terminal does not support Kitty keyboard protocol, virtual piano disabled");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut t = Tui {
        app,
        piano: VirtualPiano::new(kitty_supported),
        devices: None,
        hover: None,
        pointer_held: None,
        areas: Areas::default(),
        quit: false,
    };

    let result = event_loop(&mut terminal, &mut t);

    t.release_all();
    t.app.disconnect();

    if kitty_supported {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags).ok();
    }
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    crossterm::terminal::disable_raw_mode()?;

    result.map_err(Into::into)
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    t: &mut Tui,
) -> io::Result<()> {
    loop {
        t.app.pump();
        t.sync_devices();

        render(terminal, t)?;
        if t.quit {
            break;
        }

        // Poll with timeout so connection events are drained even when
        // there's no user input.
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        process_event(t, event::read()?);
        while event::poll(Duration::ZERO)? {
            process_event(t, event::read()?);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Event processing
// ---------------------------------------------------------------------------

fn process_event(t: &mut Tui, ev: Event) {
    match ev {
        Event::Key(key) => handle_key(t, key),
        Event::Mouse(mouse) => handle_mouse(t, mouse.kind, mouse.column, mouse.row),
        _ => {}
    }
}

fn handle_key(t: &mut Tui, key: KeyEvent) {
    let press = key.kind == KeyEventKind::Press;
    let repeat = key.kind == KeyEventKind::Repeat;

    if press && key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => t.quit = true,
            KeyCode::Char('d') => t.open_devices(),
            KeyCode::Char('n') => t.intent(Intent::NextLesson),
            KeyCode::Char('t') => t.toggle_root_indicator(),
            KeyCode::Char('e') => t.intent(Intent::ClearError),
            KeyCode::Char('r') => t.reconnect(),
            _ => {}
        }
        return;
    }

    if let Some(list) = t.devices.as_mut() {
        if press || repeat {
            match key.code {
                KeyCode::Up => list.up(),
                KeyCode::Down => list.down(),
                KeyCode::Esc => t.devices = None,
                KeyCode::Enter => {
                    let index = list.selected;
                    t.confirm_device(index);
                }
                _ => {}
            }
        }
        return;
    }

    if press || repeat {
        match key.code {
            KeyCode::Up => return t.change_volume(1.0),
            KeyCode::Down => return t.change_volume(-1.0),
            KeyCode::Esc => return t.intent(Intent::ClearError),
            _ => {}
        }
    }

    if let Some(intent) = t.piano.handle_key_event(key) {
        t.intent(intent);
    }
}

fn handle_mouse(t: &mut Tui, kind: MouseEventKind, x: u16, y: u16) {
    if t.devices.is_some() {
        if let MouseEventKind::Down(MouseButton::Left) = kind {
            let area = t.areas.devices;
            match t.devices.as_mut().and_then(|list| list.click_at(y, area)) {
                Some(index) if x >= area.x && x < area.right() => t.confirm_device(index),
                _ => t.devices = None,
            }
        }
        return;
    }

    match kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(action) = action_bar_hit(x, y, t.areas.action_bar, ACTIONS) {
                t.run_action(action);
                return;
            }
            if let Some(note) = t.key_at(x, y) {
                t.hover = Some(note);
                t.pointer_held = Some(note);
                t.intent(Intent::PressKey(note));
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if let Some(note) = t.pointer_held.take() {
                t.intent(Intent::ReleaseKey(note));
            }
        }
        MouseEventKind::Moved | MouseEventKind::Drag(MouseButton::Left) => {
            let under = t.key_at(x, y);
            t.hover = under;
            if let Some(held) = t.pointer_held {
                if under != Some(held) {
                    t.pointer_held = None;
                    t.intent(Intent::ReleaseKey(held));
                }
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    t: &mut Tui,
) -> io::Result<()> {
    terminal.draw(|frame| {
        let area = frame.area();
        let state = t.app.state();
        let error_height = u16::from(state.error.is_some());
        let [
            error_area,
            header_area,
            lesson_area,
            label_area,
            keys_area,
            footer_area,
            action_area,
        ] = Layout::vertical([
            Constraint::Length(error_height),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(6),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        t.areas.keys = keys_area;
        t.areas.action_bar = action_area;

        if let Some(error) = &state.error {
            frame.render_widget(
                Paragraph::new(format!(" {error}  (Esc to dismiss)"))
                    .style(Style::default().fg(Color::White).bg(Color::Red)),
                error_area,
            );
        }

        frame.render_widget(Paragraph::new(header_line(state, &t.piano)), header_area);

        let lesson_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Lesson ");
        frame.render_widget(
            Paragraph::new(lesson_lines(state.lesson.as_ref(), state.connected))
                .block(lesson_block)
                .wrap(Wrap { trim: true }),
            lesson_area,
        );

        let range = state.key_range();
        let (white, black) = key_cells(state, range, t.hover, t.pointer_held);
        let keys = PianoKeys::new(&white, &black);
        let geo = keys.geometry(keys_area);
        frame.render_widget(keys, keys_area);

        if let Some(note) = t.hover.filter(|&n| range.contains(n)) {
            let rect = if crate::keyboard::is_black(note) {
                geo.black_rect(range.black_key_anchor(note))
            } else {
                geo.white_rect(range.white_keys_below(note))
            };
            let x = rect.x.min(label_area.right().saturating_sub(4));
            frame.render_widget(
                Paragraph::new(note_name(note)).style(Style::default().fg(Color::Yellow)),
                Rect::new(x, label_area.y, 4u16.min(label_area.width), label_area.height),
            );
        }

        frame.render_widget(
            Paragraph::new(range.to_string()).style(Style::default().fg(Color::DarkGray)),
            footer_area,
        );

        render_action_bar(frame, action_area);

        if let Some(wf) = &state.init_workflow {
            if state.workflow_phase() != Phase::Idle {
                let (step, total) = wf.progress();
                render_init_popup(frame, area, &wf.device_id, wf.prompt(), step, total);
            }
        }
        if let Some(list) = t.devices.as_mut() {
            t.areas.devices = render_device_popup(frame, area, state, list);
        }
    })?;
    Ok(())
}

fn header_line(state: &AppState, piano: &VirtualPiano) -> Line<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let status_style = if state.connected {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let piano_text = if piano.enabled() {
        format!("Piano: octave {}", piano.base_octave())
    } else {
        "Piano: off".to_string()
    };
    Line::from(vec![
        Span::styled(format!(" {} ", state.device_status()), status_style),
        Span::styled("│ ", dim),
        Span::raw(format!("Vol {}% ", state.volume_percent())),
        Span::styled("│ ", dim),
        Span::raw(format!(
            "Root {} ",
            if state.show_root_indicator { "on" } else { "off" }
        )),
        Span::styled("│ ", dim),
        Span::styled(piano_text, dim),
    ])
}

fn lesson_lines(lesson: Option<&Lesson>, connected: bool) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let Some(lesson) = lesson else {
        let hint = if connected {
            "No lesson yet. Ctrl+N asks for one."
        } else {
            "Waiting for the server…"
        };
        return vec![Line::styled(hint, dim)];
    };

    let intervals = match &lesson.interval_labels {
        Some(labels) => lesson
            .intervals
            .iter()
            .zip(labels.iter())
            .map(|(i, l)| format!("{i} ({l})"))
            .collect::<Vec<_>>()
            .join("  "),
        None => lesson
            .intervals
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join("  "),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} {}", lesson.key, lesson.name),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" ({})", lesson.kind), dim),
        ]),
        Line::from(vec![
            Span::styled("Notes:     ", dim),
            Span::raw(lesson.note_names.join(" ")),
        ]),
        Line::from(vec![Span::styled("Intervals: ", dim), Span::raw(intervals)]),
    ];
    if !lesson.historical_blurb.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::raw(lesson.historical_blurb.clone()));
    }
    lines
}

/// Feedback for one key: `Some(true)` correct, `Some(false)` incorrect,
/// `None` when the key is neither pressed nor hovered.
fn feedback(state: &AppState, note: Note, hover: Option<Note>, held: Option<Note>) -> Option<bool> {
    if state.is_active(note) {
        return Some(state.is_correct(note).unwrap_or_else(|| state.is_lesson_note(note)));
    }
    if held == Some(note) || hover == Some(note) {
        return Some(state.is_lesson_note(note));
    }
    None
}

fn key_style(black: bool, feedback: Option<bool>) -> Style {
    match (feedback, black) {
        (Some(true), _) => Style::default().fg(Color::Black).bg(Color::Green),
        (Some(false), _) => Style::default().fg(Color::White).bg(Color::Red),
        (None, false) => Style::default().fg(Color::Black).bg(Color::White),
        (None, true) => Style::default().fg(Color::White).bg(Color::Black),
    }
}

fn key_cells(
    state: &AppState,
    range: KeyRange,
    hover: Option<Note>,
    held: Option<Note>,
) -> (Vec<KeyCell>, Vec<BlackKey>) {
    let root = state.root_indicator();
    let cell = |note: Note, black: bool| {
        KeyCell::new(key_style(black, feedback(state, note, hover, held)))
            .marker((root == Some(note)).then_some(ROOT_MARKER))
    };
    let layout = range.layout();
    let white = layout.white.iter().map(|&n| cell(n, false)).collect();
    let black = layout
        .black
        .iter()
        .map(|&n| BlackKey {
            anchor: range.black_key_anchor(n),
            cell: cell(n, true),
        })
        .collect();
    (white, black)
}

/// Next volume `steps` increments away, snapped to the step grid.
fn step_volume(current: f32, steps: f32) -> f32 {
    ((current / VOLUME_STEP).round() + steps) * VOLUME_STEP
}

fn render_action_bar(frame: &mut ratatui::Frame, area: Rect) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let key_style = Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD);
    let label_style = Style::default().fg(Color::White);

    let y = area.y;
    let mut x = area.x;

    for &(key, desc, _) in ACTIONS {
        if x > area.x {
            x += 1;
        }
        for (text, style) in [(format!(" {key} "), key_style), (format!(" {desc}"), label_style)] {
            for ch in text.chars() {
                if x >= area.right() {
                    break;
                }
                if let Some(c) = frame.buffer_mut().cell_mut((x, y)) {
                    c.set_char(ch);
                    c.set_style(style);
                }
                x += 1;
            }
        }
    }
}

fn action_bar_hit(
    x: u16,
    y: u16,
    area: Rect,
    actions: &[(&str, &str, BarAction)],
) -> Option<BarAction> {
    if y != area.y || x < area.x || x >= area.right() {
        return None;
    }
    let rel_x = (x - area.x) as usize;
    let mut pos = 0;
    for &(key, desc, action) in actions {
        if pos > 0 {
            pos += 1;
        }
        let total = key.chars().count() + 2 + desc.chars().count() + 1;
        if rel_x >= pos && rel_x < pos + total {
            return Some(action);
        }
        pos += total;
    }
    None
}

fn render_init_popup(
    frame: &mut ratatui::Frame,
    area: Rect,
    device_id: &str,
    prompt: &str,
    step: u8,
    total: u8,
) {
    let popup = centered_rect(50, 6, area);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Set up {device_id} "));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let lines = vec![
        Line::styled(prompt.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Line::raw(""),
        Line::styled(
            format!("Step {step} of {total}"),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

/// Returns the inner list area for mouse hit testing.
fn render_device_popup(
    frame: &mut ratatui::Frame,
    area: Rect,
    state: &AppState,
    list: &mut ListState,
) -> Rect {
    let w = (area.width * 60 / 100).max(30).min(area.width);
    let max_h = area.height.max(3) * 60 / 100 + 2;
    let h = (state.devices.len() as u16 + 2).clamp(3, max_h).min(area.height);
    let popup = centered_rect(w, h, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" MIDI Devices ");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    if state.devices.is_empty() {
        frame.render_widget(
            Paragraph::new("  (none found)").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return inner;
    }

    list.ensure_visible(inner.height as usize);
    let items: Vec<ListItem> = state
        .devices
        .iter()
        .map(|id| {
            let mut item = ListItem::new(id.as_str());
            if let Some(config) = state.device_configs.get(id) {
                item = item.note(format!(
                    "{} keys ({}–{})",
                    config.key_count, config.low_note, config.high_note
                ));
            }
            if state.selected_device_id.as_ref() == Some(id) {
                item = item.style(Style::default().fg(Color::Green));
            }
            item
        })
        .collect();
    frame.render_widget(List::new(&items, list), inner);
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerEvent;

    fn lesson(notes: Vec<Note>) -> Lesson {
        Lesson {
            kind: "chord".into(),
            key: "C".into(),
            octave: Some(4),
            name: "Major".into(),
            intervals: vec![0, 4, 7],
            interval_labels: Some(vec!["R".into(), "M3".into(), "P5".into()]),
            note_names: vec!["C".into(), "E".into(), "G".into()],
            midi_notes: notes,
            historical_blurb: String::new(),
        }
    }

    fn midi_note(state: &mut AppState, note: Note, on: bool, is_correct: bool) {
        state.apply(Action::Server(ServerEvent::MidiNote {
            note,
            on,
            is_correct,
        }));
    }

    #[test]
    fn backend_verdict_beats_lesson_membership() {
        let mut state = AppState::new(false);
        state.lesson = Some(lesson(vec![60, 64, 67]));
        midi_note(&mut state, 60, true, false);
        assert_eq!(feedback(&state, 60, None, None), Some(false));
        midi_note(&mut state, 61, true, true);
        assert_eq!(feedback(&state, 61, None, None), Some(true));
    }

    #[test]
    fn hover_uses_lesson_membership() {
        let mut state = AppState::new(false);
        state.lesson = Some(lesson(vec![60, 64, 67]));
        assert_eq!(feedback(&state, 64, Some(64), None), Some(true));
        assert_eq!(feedback(&state, 65, Some(65), None), Some(false));
        assert_eq!(feedback(&state, 65, None, Some(65)), Some(false));
        assert_eq!(feedback(&state, 65, Some(64), None), None);
    }

    #[test]
    fn released_key_loses_feedback() {
        let mut state = AppState::new(false);
        midi_note(&mut state, 60, true, true);
        midi_note(&mut state, 60, false, true);
        assert_eq!(feedback(&state, 60, None, None), None);
    }

    #[test]
    fn root_marker_follows_preference() {
        let mut state = AppState::new(true);
        state.lesson = Some(lesson(vec![61, 65, 68]));
        let range = KeyRange::new(60, 72);
        let (white, black) = key_cells(&state, range, None, None);
        assert_eq!(white.len(), 8);
        assert_eq!(black.len(), 5);
        assert_eq!(black[0].anchor, Some(0));
        assert_eq!(black[0].cell.marker, Some(ROOT_MARKER));
        assert!(white.iter().all(|c| c.marker.is_none()));

        state.show_root_indicator = false;
        let (_, black) = key_cells(&state, range, None, None);
        assert_eq!(black[0].cell.marker, None);
    }

    #[test]
    fn volume_steps_snap_to_grid() {
        assert!((step_volume(0.8, 1.0) - 0.85).abs() < 1e-6);
        assert!((step_volume(0.83, -1.0) - 0.8).abs() < 1e-6);
        assert!((step_volume(0.0, -1.0) + 0.05).abs() < 1e-6);
    }

    #[test]
    fn action_bar_hits_by_position() {
        let area = Rect::new(0, 10, 80, 1);
        // " ^D " + " Devices" = 12 columns, then a gap.
        assert_eq!(action_bar_hit(0, 10, area, ACTIONS), Some(BarAction::Devices));
        assert_eq!(action_bar_hit(11, 10, area, ACTIONS), Some(BarAction::Devices));
        assert_eq!(action_bar_hit(12, 10, area, ACTIONS), None);
        assert_eq!(action_bar_hit(13, 10, area, ACTIONS), Some(BarAction::NextLesson));
        assert_eq!(action_bar_hit(0, 9, area, ACTIONS), None);
    }

    fn offline_tui() -> Tui {
        let app = App::new("ws://127.0.0.1:9/ws".into(), crate::prefs::Preferences::in_memory());
        Tui {
            app,
            piano: VirtualPiano::new(false),
            devices: None,
            hover: None,
            pointer_held: None,
            areas: Areas {
                action_bar: Rect::new(0, 20, 80, 1),
                ..Areas::default()
            },
            quit: false,
        }
    }

    fn click(t: &mut Tui, x: u16, y: u16) {
        handle_mouse(t, MouseEventKind::Down(MouseButton::Left), x, y);
    }

    #[test]
    fn volume_chips_step_the_volume() {
        let mut t = offline_tui();
        let start = t.app.state().volume;
        // " ↑ " + " Louder" starts at column 30, " ↓ " + " Quieter" at 41.
        assert_eq!(action_bar_hit(31, 20, t.areas.action_bar, ACTIONS), Some(BarAction::Louder));
        assert_eq!(action_bar_hit(42, 20, t.areas.action_bar, ACTIONS), Some(BarAction::Quieter));

        click(&mut t, 31, 20);
        assert_eq!(t.app.state().volume, step_volume(start, 1.0));
        click(&mut t, 42, 20);
        click(&mut t, 42, 20);
        assert_eq!(t.app.state().volume, step_volume(step_volume(start, 1.0), -2.0));
    }

    #[test]
    fn every_action_bar_entry_does_something() {
        let mut t = offline_tui();
        click(&mut t, 0, 20);
        assert!(t.devices.is_some());
        t.devices = None;

        let shown = t.app.state().show_root_indicator;
        t.run_action(BarAction::Root);
        assert_eq!(t.app.state().show_root_indicator, !shown);

        t.run_action(BarAction::Quit);
        assert!(t.quit);
    }

    #[test]
    fn lesson_panel_shows_interval_labels() {
        let l = lesson(vec![60, 64, 67]);
        let lines = lesson_lines(Some(&l), true);
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(text[0], "C Major (chord)");
        assert_eq!(text[1], "Notes:     C E G");
        assert_eq!(text[2], "Intervals: 0 (R)  4 (M3)  7 (P5)");
        assert_eq!(text.len(), 3);
    }
}
