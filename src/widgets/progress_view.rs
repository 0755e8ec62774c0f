use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::batch::progress::{ProgressLog, ITEM_STEP};
use crate::theme::{status_tag, Theme};
use crate::widgets::chrome::panel_block;

/// Flatten the progress table into display lines: item rows flush left, their
/// steps indented, tracebacks under failed rows.
pub fn progress_lines(log: &ProgressLog, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    if let Some((status, message)) = log.status() {
        lines.push(Line::styled(
            message.to_string(),
            Style::default()
                .fg(theme.status_color(Some(status)))
                .add_modifier(Modifier::BOLD),
        ));
    }
    for row in log.rows() {
        let indent = if row.key.step_type == ITEM_STEP { "" } else { "  " };
        let label = if row.key.step_type == ITEM_STEP {
            row.key.label.clone()
        } else {
            format!("{} {}", row.key.step_type, row.key.label)
        };
        let mut spans = vec![
            Span::raw(indent.to_string()),
            Span::styled(
                format!("{} ", status_tag(row.status)),
                Style::default().fg(theme.status_color(row.status)),
            ),
            Span::raw(label),
        ];
        if !row.message.is_empty() {
            spans.push(Span::styled(format!("  {}", row.message), theme.text_muted()));
        }
        lines.push(Line::from(spans));
        if let Some(tb) = &row.traceback {
            for l in tb.lines() {
                lines.push(Line::styled(format!("{indent}    {l}"), theme.text_error()));
            }
        }
    }
    lines
}

pub fn draw_progress(f: &mut Frame, area: Rect, log: &ProgressLog, theme: &Theme, focused: bool) {
    let lines = progress_lines(log, theme);
    // Follow the tail while a batch is writing rows
    let inner_h = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(inner_h);
    let lines: Vec<Line> = if lines.is_empty() {
        vec![Line::styled("Press r to publish the checked items", theme.text_muted())]
    } else {
        lines.into_iter().skip(skip).collect()
    };
    let p = Paragraph::new(lines)
        .block(panel_block("Progress", focused))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}
