use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

/// A vertical list with one highlighted row, scrolled so the highlighted
/// row stays visible.
pub struct List<'a> {
    items: &'a [ListItem],
    selected: usize,
    offset: usize,
    cursor: &'a str,
}

/// One row: a label and an optional dimmed note after it.
pub struct ListItem {
    pub label: String,
    pub note: Option<String>,
    pub style: Style,
}

impl ListItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            note: None,
            style: Style::default(),
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

/// Selection and scroll offset for a [`List`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListState {
    pub selected: usize,
    pub offset: usize,
    pub len: usize,
}

impl ListState {
    pub fn new(len: usize) -> Self {
        Self {
            selected: 0,
            offset: 0,
            len,
        }
    }

    /// Move down, wrapping at the end.
    pub fn down(&mut self) {
        if self.len > 0 {
            self.selected = (self.selected + 1) % self.len;
        }
    }

    /// Move up, wrapping at the start.
    pub fn up(&mut self) {
        if self.len > 0 {
            self.selected = (self.selected + self.len - 1) % self.len;
        }
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.len.saturating_sub(1));
    }

    /// Update the item count, keeping the selection in bounds.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        self.offset = self.offset.min(self.selected);
    }

    pub fn ensure_visible(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + visible_height {
            self.offset = self.selected - visible_height + 1;
        }
    }

    /// Select the row under `y` in a list rendered at `area`. Returns the
    /// index when a row was hit.
    pub fn click_at(&mut self, y: u16, area: Rect) -> Option<usize> {
        if y < area.y || y >= area.bottom() {
            return None;
        }
        let idx = self.offset + (y - area.y) as usize;
        if idx < self.len {
            self.selected = idx;
            Some(idx)
        } else {
            None
        }
    }
}

impl<'a> List<'a> {
    pub fn new(items: &'a [ListItem], state: &ListState) -> Self {
        Self {
            items,
            selected: state.selected,
            offset: state.offset,
            cursor: "▸ ",
        }
    }
}

fn write_str(buf: &mut Buffer, x: &mut u16, y: u16, right: u16, text: &str, style: Style) {
    for ch in text.chars() {
        if *x >= right {
            return;
        }
        if let Some(cell) = buf.cell_mut((*x, y)) {
            cell.set_char(ch);
            cell.set_style(style);
        }
        *x += 1;
    }
}

impl Widget for List<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let cursor_width = self.cursor.chars().count() as u16;
        let note_style = Style::default().fg(Color::DarkGray);
        let selected_style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);

        for (row, (idx, item)) in self
            .items
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(area.height as usize)
            .enumerate()
        {
            let y = area.y + row as u16;
            let is_selected = idx == self.selected;
            let base = if is_selected {
                selected_style
            } else {
                Style::default()
            };
            let mut x = area.x;
            if is_selected {
                write_str(buf, &mut x, y, area.right(), self.cursor, base);
            } else {
                x += cursor_width;
            }
            write_str(buf, &mut x, y, area.right(), &item.label, base.patch(item.style));
            if let Some(note) = &item.note {
                x += 1;
                write_str(buf, &mut x, y, area.right(), note, note_style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn navigation_wraps() {
        let mut state = ListState::new(3);
        state.up();
        assert_eq!(state.selected, 2);
        state.down();
        assert_eq!(state.selected, 0);

        let mut empty = ListState::new(0);
        empty.down();
        empty.up();
        assert_eq!(empty.selected, 0);
    }

    #[test]
    fn shrinking_keeps_selection_in_bounds() {
        let mut state = ListState::new(5);
        state.select(4);
        state.ensure_visible(2);
        assert_eq!(state.offset, 3);
        state.set_len(2);
        assert_eq!(state.selected, 1);
        assert_eq!(state.offset, 1);
    }

    #[test]
    fn click_selects_row_under_pointer() {
        let area = Rect::new(0, 2, 20, 3);
        let mut state = ListState::new(2);
        assert_eq!(state.click_at(3, area), Some(1));
        assert_eq!(state.selected, 1);
        assert_eq!(state.click_at(4, area), None);
        assert_eq!(state.click_at(1, area), None);
    }

    #[test]
    fn renders_cursor_and_notes() {
        let items = vec![ListItem::new("KB-1").note("61 keys"), ListItem::new("KB-2")];
        let state = ListState::new(2);
        let area = Rect::new(0, 0, 20, 2);
        let mut buf = Buffer::empty(area);
        List::new(&items, &state).render(area, &mut buf);
        assert_eq!(row(&buf, 0), "▸ KB-1 61 keys");
        assert_eq!(row(&buf, 1), "  KB-2");
    }
}
