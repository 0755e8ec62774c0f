use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::batch::progress::StepKey;
use crate::ui::AppState;
use crate::widgets::chrome::{panel_block, scroll_window};

/// Batch items with their check box and the status of their progress row.
pub fn draw_items(f: &mut Frame, area: Rect, state: &AppState, focused: bool) {
    let inner_h = area.height.saturating_sub(2);
    let (start, end) = scroll_window(state.items.len(), state.selected, inner_h);
    let in_flight = state.queue.as_ref().and_then(|q| q.in_flight());
    let mut lines: Vec<Line> = Vec::new();
    for (i, item) in state.items.iter().enumerate().take(end).skip(start) {
        let mark = if item.checked { "[x]" } else { "[ ]" };
        let status = state
            .progress
            .row(&StepKey::item(item.label.clone(), item.item_id.clone()))
            .and_then(|r| r.status);
        let mut spans = vec![Span::raw(format!("{mark} {}", item.label))];
        if in_flight == Some(item.item_id.as_str()) {
            let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][state.tick as usize % 6];
            spans.push(Span::styled(
                format!(" {spinner}"),
                Style::default().fg(state.theme.running),
            ));
        } else if status.is_some() {
            spans.push(Span::styled(
                format!(" {}", crate::theme::status_tag(status)),
                Style::default().fg(state.theme.status_color(status)),
            ));
        }
        let mut line = Line::from(spans);
        if i == state.selected {
            line = line.style(state.theme.list_cursor_style());
        } else if !item.checked {
            line = line.style(state.theme.text_muted());
        }
        lines.push(line);
    }
    if state.items.is_empty() {
        lines.push(Line::styled("No items", state.theme.text_muted()));
    }
    let title = format!("Items ({}/{})", state.checked_count(), state.items.len());
    let p = Paragraph::new(lines).block(panel_block(&title, focused));
    f.render_widget(p, area);
}
