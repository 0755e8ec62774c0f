use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::widgets::chrome::panel_block;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn get_theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let ts = THEME_SET.get_or_init(ThemeSet::load_defaults);
        ts.themes
            .get("base16-ocean.dark")
            .cloned()
            .unwrap_or_else(|| ts.themes.values().next().cloned().unwrap_or_default())
    })
}

fn syn_to_tui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// Highlight pretty-printed JSON line by line. Falls back to plain text when
/// the JSON syntax is not bundled.
pub fn highlight_json(text: &str) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let syn = ps
        .find_syntax_by_extension("json")
        .unwrap_or_else(|| ps.find_syntax_plain_text());
    let mut high = HighlightLines::new(syn, get_theme());
    let mut out: Vec<Line<'static>> = Vec::new();
    for line in text.split('\n') {
        let regions: Vec<(SynStyle, &str)> = high.highlight_line(line, ps).unwrap_or_default();
        let mut spans: Vec<Span<'static>> = Vec::new();
        for (st, seg) in regions {
            let mut style = Style::default().fg(syn_to_tui_color(st.foreground));
            if st.font_style.contains(FontStyle::BOLD) {
                style = style.add_modifier(Modifier::BOLD);
            }
            if st.font_style.contains(FontStyle::ITALIC) {
                style = style.add_modifier(Modifier::ITALIC);
            }
            spans.push(Span::styled(seg.to_string(), style));
        }
        out.push(Line::from(spans));
    }
    out
}

/// Read-only view of the definition an item would be published with.
pub struct JsonPreview {
    pub title: String,
    text: String,
    lines: Vec<Line<'static>>,
    pub scroll_y: u16,
    pub wrap: bool,
    last_viewport_h: u16,
}

impl JsonPreview {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = highlight_json(&text);
        Self {
            title: title.into(),
            text,
            lines,
            scroll_y: 0,
            wrap: false,
            last_viewport_h: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn max_scroll(&self) -> u16 {
        (self.lines.len() as u16).saturating_sub(self.last_viewport_h)
    }
}

impl crate::widgets::Widget for JsonPreview {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        self.last_viewport_h = area.height.saturating_sub(2);
        self.scroll_y = self.scroll_y.min(self.max_scroll());
        let title = format!("Definition: {}", self.title);
        let p = Paragraph::new(self.lines.clone())
            .block(panel_block(&title, focused))
            .wrap(Wrap { trim: !self.wrap })
            .scroll((self.scroll_y, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<crate::app::Effect> {
        match key {
            KeyCode::Up => self.scroll_y = self.scroll_y.saturating_sub(1),
            KeyCode::Down => self.scroll_y = self.scroll_y.saturating_add(1),
            KeyCode::PageUp => self.scroll_y = self.scroll_y.saturating_sub(self.last_viewport_h),
            KeyCode::PageDown => {
                self.scroll_y = self.scroll_y.saturating_add(self.last_viewport_h)
            }
            KeyCode::Home => self.scroll_y = 0,
            KeyCode::End => self.scroll_y = self.max_scroll(),
            KeyCode::Char('w') | KeyCode::Char('W') => self.wrap = !self.wrap,
            KeyCode::Esc => return vec![crate::app::Effect::CloseView],
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

    #[test]
    fn highlighting_keeps_the_text() {
        let text = "{\n  \"name\": \"File Publisher\"\n}";
        let lines = highlight_json(text);
        assert_eq!(lines.len(), 3);
        let middle: String = lines[1].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(middle, "  \"name\": \"File Publisher\"");
    }

    #[test]
    fn end_jumps_to_bottom_and_esc_closes() {
        let text = (0..30)
            .map(|i| format!("\"line-{i}\""))
            .collect::<Vec<_>>()
            .join("\n");
        let mut w = JsonPreview::new("cube", text);
        let backend = TestBackend::new(40, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| w.render(f, f.area(), true, 0)).unwrap();
        w.on_key(KeyCode::End);
        assert_eq!(w.scroll_y, 30 - 10);
        w.on_key(KeyCode::Home);
        assert_eq!(w.scroll_y, 0);
        assert!(matches!(
            w.on_key(KeyCode::Esc).as_slice(),
            [crate::app::Effect::CloseView]
        ));
    }
}
