pub mod keys;
pub mod list;

pub use keys::{BlackKey, KeyCell, KeyGeometry, KeyHit, PianoKeys};
pub use list::{List, ListItem, ListState};

use ratatui::layout::Rect;

/// Compute a centered rectangle within `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect::new(x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_clamps_to_area() {
        let area = Rect::new(10, 5, 40, 10);
        assert_eq!(centered_rect(20, 4, area), Rect::new(20, 8, 20, 4));
        assert_eq!(centered_rect(100, 100, area), area);
    }
}
