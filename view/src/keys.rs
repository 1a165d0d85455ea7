use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

/// Widest a white key is drawn, in columns.
pub const MAX_WHITE_WIDTH: u16 = 4;

/// Appearance of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCell {
    pub style: Style,
    /// Drawn near the bottom edge of the key (e.g. a root marker).
    pub marker: Option<char>,
}

impl KeyCell {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            marker: None,
        }
    }

    pub fn marker(mut self, marker: Option<char>) -> Self {
        self.marker = marker;
        self
    }
}

/// A black key placed over the white row. `anchor` is the index of the
/// white key it sits to the right of; without one the key is drawn at the
/// left edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackKey {
    pub anchor: Option<usize>,
    pub cell: KeyCell,
}

/// Which key a screen position falls on, as an index into the white or
/// black slice passed to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHit {
    White(usize),
    Black(usize),
}

/// Column geometry shared by rendering and hit testing, so a click always
/// lands on the key that was drawn there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGeometry {
    pub area: Rect,
    pub white_width: u16,
    pub black_width: u16,
    pub black_height: u16,
}

impl KeyGeometry {
    pub fn new(area: Rect, white_count: usize) -> Self {
        let white_width = if white_count == 0 {
            1
        } else {
            (area.width as usize / white_count).clamp(1, MAX_WHITE_WIDTH as usize) as u16
        };
        Self {
            area,
            white_width,
            black_width: (white_width / 2).max(1),
            black_height: (area.height * 3 / 5).max(1).min(area.height),
        }
    }

    /// Columns of the `index`-th white key, clipped to the area.
    pub fn white_rect(&self, index: usize) -> Rect {
        let x = self.area.x as usize + index * self.white_width as usize;
        self.clip(x, self.white_width, self.area.height)
    }

    /// Columns of a black key anchored on white key `anchor`. It straddles
    /// the boundary between that key and the next.
    pub fn black_rect(&self, anchor: Option<usize>) -> Rect {
        let x = match anchor {
            Some(a) => {
                let boundary = self.area.x as usize + (a + 1) * self.white_width as usize;
                boundary.saturating_sub((self.black_width / 2) as usize)
            }
            None => self.area.x as usize,
        };
        self.clip(x, self.black_width, self.black_height)
    }

    fn clip(&self, x: usize, width: u16, height: u16) -> Rect {
        let right = self.area.right() as usize;
        if x >= right {
            return Rect::new(self.area.right(), self.area.y, 0, 0);
        }
        let width = (width as usize).min(right - x) as u16;
        Rect::new(x as u16, self.area.y, width, height)
    }

    /// Black keys win over the white key underneath them.
    pub fn hit(
        &self,
        x: u16,
        y: u16,
        white_count: usize,
        anchors: &[Option<usize>],
    ) -> Option<KeyHit> {
        let pos = ratatui::layout::Position::new(x, y);
        if !self.area.contains(pos) {
            return None;
        }
        if let Some(i) = anchors
            .iter()
            .position(|&a| self.black_rect(a).contains(pos))
        {
            return Some(KeyHit::Black(i));
        }
        let index = ((x - self.area.x) / self.white_width) as usize;
        (index < white_count).then_some(KeyHit::White(index))
    }
}

/// A piano keyboard: a row of white keys with black keys drawn over their
/// upper part.
pub struct PianoKeys<'a> {
    white: &'a [KeyCell],
    black: &'a [BlackKey],
}

impl<'a> PianoKeys<'a> {
    pub fn new(white: &'a [KeyCell], black: &'a [BlackKey]) -> Self {
        Self { white, black }
    }

    pub fn geometry(&self, area: Rect) -> KeyGeometry {
        KeyGeometry::new(area, self.white.len())
    }
}

fn fill(buf: &mut Buffer, rect: Rect, style: Style) {
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(' ');
                cell.set_style(style);
            }
        }
    }
}

fn put(buf: &mut Buffer, x: u16, y: u16, ch: char, style: Style) {
    if let Some(cell) = buf.cell_mut((x, y)) {
        cell.set_char(ch);
        cell.set_style(style);
    }
}

impl Widget for PianoKeys<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 || self.white.is_empty() {
            return;
        }
        let geo = self.geometry(area);
        let separator = Style::default().fg(Color::DarkGray);

        for (i, key) in self.white.iter().enumerate() {
            let rect = geo.white_rect(i);
            if rect.width == 0 {
                break;
            }
            fill(buf, rect, key.style);
            if geo.white_width > 1 {
                let x = rect.right() - 1;
                for y in rect.top()..rect.bottom() {
                    put(buf, x, y, '▕', key.style.patch(separator));
                }
            }
            if let Some(m) = key.marker {
                put(buf, rect.x + (rect.width - 1) / 2, rect.bottom() - 1, m, key.style);
            }
        }

        for key in self.black {
            let rect = geo.black_rect(key.anchor);
            if rect.width == 0 {
                continue;
            }
            fill(buf, rect, key.cell.style);
            if let Some(m) = key.cell.marker {
                put(buf, rect.x, rect.bottom() - 1, m, key.cell.style);
            }
        }
    }
}
