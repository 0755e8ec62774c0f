use crossterm::event::KeyCode;
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use ratatui::widgets::*;
use tui_textarea::TextArea;

use crate::app::Effect;
use crate::factory::rows::{FormRow, RowTarget};
use crate::widgets::chrome::{panel_block, scroll_window};

/// Form for one item's definition: a flattened row per rendered widget.
/// Leaf values are edited in a one-line `TextArea`; check boxes flip in place.
pub struct OptionsView {
    pub title: String,
    pub rows: Vec<FormRow>,
    pub selected: usize,
    editor: Option<TextArea<'static>>,
}

impl OptionsView {
    pub fn new(title: impl Into<String>, rows: Vec<FormRow>) -> Self {
        let selected = rows.iter().position(|r| r.is_editable()).unwrap_or(0);
        Self {
            title: title.into(),
            rows,
            selected,
            editor: None,
        }
    }

    /// Replace rows after an edit or a status update, keeping the cursor.
    pub fn set_rows(&mut self, rows: Vec<FormRow>) {
        self.rows = rows;
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    fn current(&self) -> Option<&FormRow> {
        self.rows.get(self.selected)
    }

    fn begin_edit(&mut self) {
        let Some(row) = self.current() else {
            return;
        };
        let mut ta = TextArea::default();
        ta.insert_str(row.value.clone().unwrap_or_default());
        if let Some(hint) = &row.placeholder {
            ta.set_placeholder_text(hint.clone());
        }
        ta.set_block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(crate::theme::border_focused())
                .title(format!("Editing: {} • Enter Save • Esc Cancel", row.label)),
        );
        self.editor = Some(ta);
    }

    fn commit(&mut self) -> Vec<Effect> {
        let Some(ta) = self.editor.take() else {
            return Vec::new();
        };
        let Some(row) = self.current() else {
            return Vec::new();
        };
        vec![Effect::EditRow {
            target: row.target.clone(),
            text: Some(ta.lines().join("")),
        }]
    }

    fn activate(&mut self) -> Vec<Effect> {
        let Some(target) = self.current().map(|r| r.target.clone()) else {
            return Vec::new();
        };
        match target {
            RowTarget::None => Vec::new(),
            RowTarget::Toggle(_) => vec![Effect::EditRow { target, text: None }],
            RowTarget::Leaf(_) | RowTarget::PluginOption { .. } => {
                self.begin_edit();
                Vec::new()
            }
        }
    }

    fn step(&mut self, down: bool) {
        if self.rows.is_empty() {
            return;
        }
        let n = self.rows.len();
        let mut i = self.selected;
        for _ in 0..n {
            i = if down { (i + 1) % n } else { (i + n - 1) % n };
            if self.rows[i].is_editable() {
                self.selected = i;
                return;
            }
        }
    }

    fn row_line(&self, idx: usize, row: &FormRow) -> Line<'static> {
        let indent = "  ".repeat(row.depth);
        let mut spans: Vec<Span<'static>> = Vec::new();
        let label_style = if idx == self.selected {
            crate::theme::list_cursor_style()
        } else if row.is_editable() {
            Style::default()
        } else {
            crate::theme::text_active_bold()
        };
        spans.push(Span::raw(indent));
        if let Some(status) = row.status {
            spans.push(Span::styled(
                format!("{} ", crate::theme::status_tag(Some(status))),
                Style::default().fg(crate::theme::status_color(Some(status))),
            ));
        }
        match &row.target {
            RowTarget::Toggle(_) => {
                let on = row.checked.unwrap_or(false);
                spans.push(Span::styled(
                    format!("{} {}", if on { "[x]" } else { "[ ]" }, row.label),
                    label_style,
                ));
            }
            _ => {
                spans.push(Span::styled(row.label.clone(), label_style));
                match (row.value.as_deref(), row.placeholder.as_deref()) {
                    (Some(""), Some(hint)) => {
                        spans.push(Span::raw(": "));
                        spans.push(Span::styled(hint.to_string(), crate::theme::text_muted()));
                    }
                    (Some(v), _) => {
                        spans.push(Span::raw(": "));
                        spans.push(Span::styled(v.to_string(), crate::theme::text_editing_bold()));
                    }
                    (None, _) => {}
                }
            }
        }
        if let Some(err) = &row.error {
            spans.push(Span::styled(format!("  ({err})"), crate::theme::text_error()));
        }
        Line::from(spans)
    }
}

impl crate::widgets::Widget for OptionsView {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let inner_h = area.height.saturating_sub(2);
        let (start, end) = scroll_window(self.rows.len(), self.selected, inner_h);
        let mut lines: Vec<Line> = Vec::new();
        for (i, row) in self.rows.iter().enumerate().take(end).skip(start) {
            lines.push(self.row_line(i, row));
        }
        if self.rows.is_empty() {
            lines.push(Line::styled("Nothing to edit", crate::theme::text_muted()));
        }
        let title = format!("Options: {}", self.title);
        let p = Paragraph::new(lines).block(panel_block(&title, focused && !self.is_editing()));
        f.render_widget(p, area);

        if let Some(ta) = &self.editor {
            let h = 3.min(area.height);
            let rect = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(h),
                width: area.width,
                height: h,
            };
            f.render_widget(Clear, rect);
            f.render_widget(ta, rect);
        }
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        if self.is_editing() {
            match key {
                KeyCode::Enter => return self.commit(),
                KeyCode::Esc => {
                    self.editor = None;
                }
                KeyCode::Up | KeyCode::Down => {}
                other => {
                    if let Some(ta) = self.editor.as_mut() {
                        let _ = ta.input(rt_event::KeyEvent::new(
                            other,
                            rt_event::KeyModifiers::NONE,
                        ));
                    }
                }
            }
            return Vec::new();
        }
        match key {
            KeyCode::Up => self.step(false),
            KeyCode::Down => self.step(true),
            KeyCode::Enter => return self.activate(),
            KeyCode::Char(' ') => {
                let is_toggle = matches!(
                    self.current().map(|r| &r.target),
                    Some(RowTarget::Toggle(_))
                );
                if is_toggle {
                    return self.activate();
                }
            }
            KeyCode::Esc => return vec![Effect::CloseView],
            _ => {}
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::Widget;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn row(depth: usize, label: &str, value: Option<&str>, target: RowTarget) -> FormRow {
        FormRow {
            depth,
            label: label.into(),
            value: value.map(str::to_string),
            placeholder: None,
            checked: matches!(target, RowTarget::Toggle(_)).then_some(true),
            error: None,
            status: None,
            target,
        }
    }

    fn sample() -> OptionsView {
        OptionsView::new(
            "cube",
            vec![
                row(0, "File Publisher", None, RowTarget::None),
                row(1, "comment", Some("first"), RowTarget::Leaf(vec![0])),
                row(1, "validator", Some("true"), RowTarget::Toggle(vec![1])),
                FormRow {
                    placeholder: Some("untitled".into()),
                    ..row(1, "title", Some(""), RowTarget::Leaf(vec![2]))
                },
            ],
        )
    }

    #[test]
    fn cursor_skips_group_rows() {
        let mut v = sample();
        assert_eq!(v.selected, 1);
        v.on_key(KeyCode::Down);
        assert_eq!(v.selected, 2);
        v.on_key(KeyCode::Down);
        assert_eq!(v.selected, 3);
        v.on_key(KeyCode::Down);
        assert_eq!(v.selected, 1);
    }

    #[test]
    fn enter_edits_and_saves_through_an_effect() {
        let mut v = sample();
        assert!(v.on_key(KeyCode::Enter).is_empty());
        assert!(v.is_editing());
        v.on_key(KeyCode::Backspace);
        v.on_key(KeyCode::Char('!'));
        let effects = v.on_key(KeyCode::Enter);
        assert!(!v.is_editing());
        match effects.as_slice() {
            [Effect::EditRow { target, text }] => {
                assert_eq!(target, &RowTarget::Leaf(vec![0]));
                assert_eq!(text.as_deref(), Some("firs!"));
            }
            _ => panic!("expected one EditRow effect"),
        }
    }

    #[test]
    fn esc_cancels_editing_then_closes() {
        let mut v = sample();
        v.on_key(KeyCode::Enter);
        assert!(v.on_key(KeyCode::Esc).is_empty());
        assert!(!v.is_editing());
        assert!(matches!(v.on_key(KeyCode::Esc).as_slice(), [Effect::CloseView]));
    }

    #[test]
    fn space_toggles_check_rows_only() {
        let mut v = sample();
        assert!(v.on_key(KeyCode::Char(' ')).is_empty());
        v.on_key(KeyCode::Down);
        assert!(matches!(
            v.on_key(KeyCode::Char(' ')).as_slice(),
            [Effect::EditRow { text: None, .. }]
        ));
    }

    #[test]
    fn renders_values_and_check_boxes() {
        let mut v = sample();
        let backend = TestBackend::new(50, 8);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| v.render(f, f.area(), true, 0))
            .unwrap();
        let buf = terminal.backend().buffer().clone();
        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("comment: first"));
        assert!(text.contains("[x] validator"));
        assert!(text.contains("title: untitled"));
    }
}
