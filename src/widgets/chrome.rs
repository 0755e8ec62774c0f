use ratatui::widgets::{Block, Borders};

pub fn panel_block<'a>(title: &'a str, focused: bool) -> Block<'a> {
    let b = Block::default().borders(Borders::ALL).title(title);
    if focused {
        b.border_style(crate::theme::border_focused())
    } else {
        b.border_style(crate::theme::border_unfocused())
    }
}

/// Keep `selected` visible in a list of `total` rows with `inner_h` lines.
pub fn scroll_window(total: usize, selected: usize, inner_h: u16) -> (usize, usize) {
    if inner_h == 0 || total == 0 {
        return (0, 0);
    }
    let ih = inner_h as usize;
    let start = if selected >= ih { selected + 1 - ih } else { 0 };
    let end = (start + ih).min(total);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_follows_selection() {
        assert_eq!(scroll_window(0, 0, 5), (0, 0));
        assert_eq!(scroll_window(3, 2, 5), (0, 3));
        assert_eq!(scroll_window(20, 9, 5), (5, 10));
    }
}
