use crate::app::{update, AppMsg, Effect};
use crate::batch::item::{populate_items, RunItem};
use crate::batch::prepare::ContextPreparer;
use crate::batch::progress::ProgressLog;
use crate::batch::queue::{DefinitionRunQueue, QueueOptions};
use crate::batch::summary::{BatchSummary, NOTHING_TO_RUN};
use crate::factory::registry::OverrideRegistry;
use crate::factory::WidgetFactory;
use crate::services::cli_runner::CliHost;
use crate::services::config::{load_client_config, load_document, load_items, LoadedConfig};
use crate::services::event_hub::EventHub;
use crate::services::host::HostConnection;
use crate::widgets::item_list::draw_items;
use crate::widgets::json_preview::JsonPreview;
use crate::widgets::options_view::OptionsView;
use crate::widgets::progress_view::draw_progress;
use crate::widgets::status_bar::draw_footer_combined;
use crate::widgets::Widget;
use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const HEADLESS_ENV: &str = "PIPELINE_CLIENT_HEADLESS";
pub const HEADLESS_TIMEOUT_ENV: &str = "PIPELINE_CLIENT_TIMEOUT_SECS";

#[derive(Default)]
pub(crate) struct AppState {
    pub(crate) title: String,
    pub(crate) items: Vec<RunItem>,
    pub(crate) selected: usize,
    pub(crate) view: View,
    pub(crate) queue: Option<DefinitionRunQueue>,
    pub(crate) progress: ProgressLog,
    pub(crate) options: Option<OptionsView>,
    pub(crate) preview: Option<JsonPreview>,
    pub(crate) status_text: Option<String>,
    pub(crate) last_summary: Option<BatchSummary>,
    pub(crate) toast: Option<Toast>,
    pub(crate) tick: u64,
    pub(crate) should_quit: bool,
    pub(crate) theme: crate::theme::Theme,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    #[default]
    Items,
    Options,
    Preview,
}

impl AppState {
    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|i| i.checked).count()
    }

    pub fn is_running(&self) -> bool {
        self.queue.as_ref().map(|q| q.is_busy()).unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::EditRow { target, text } => {
                let more = update(state, AppMsg::EditRow { target, text });
                run_effects(state, more);
            }
            Effect::CloseView => {
                let more = update(state, AppMsg::CloseView);
                run_effects(state, more);
            }
            Effect::CopyToClipboard { text } => match arboard::Clipboard::new() {
                Ok(mut clipboard) => {
                    let _ = clipboard.set_text(&text);
                    state.dbg("definition copied to clipboard");
                    show_toast(state, "Copied to clipboard!", ToastLevel::Success, 3);
                }
                Err(e) => {
                    warn!(error = %e, "clipboard unavailable");
                    show_toast(state, format!("Clipboard unavailable: {e}"), ToastLevel::Error, 3);
                }
            },
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => show_toast(state, text, level, seconds),
            Effect::Quit => state.should_quit = true,
        }
    }
}

fn show_toast(state: &mut AppState, text: impl Into<String>, level: ToastLevel, seconds: u64) {
    let ticks = seconds.saturating_mul(5); // ~200ms tick
    state.toast = Some(Toast {
        text: text.into(),
        level,
        expires_at_tick: state.tick.saturating_add(ticks),
    });
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// Wire config, host, items and queue into a fresh state.
pub(crate) fn build_state(loaded: &LoadedConfig) -> Result<AppState> {
    let cfg = &loaded.config;
    let hub = EventHub::new();
    let host: Arc<dyn HostConnection> = Arc::new(CliHost::new(
        cfg.host_id.clone(),
        cfg.host_cmd.clone(),
        cfg.host_definitions.clone(),
        hub,
    ));
    let definition = load_document(&loaded.resolve(&cfg.definition))
        .with_context(|| format!("loading definition {}", cfg.definition))?;
    let schema = cfg
        .schema
        .as_deref()
        .map(|p| load_document(&loaded.resolve(p)))
        .transpose()
        .context("loading schema")?;
    let package = cfg
        .package
        .as_deref()
        .map(|p| load_document(&loaded.resolve(p)))
        .transpose()
        .context("loading package")?;
    let items = load_items(loaded).context("loading items")?;

    let items = populate_items(items, &definition, schema.as_ref(), |item| {
        let mut factory = WidgetFactory::new(OverrideRegistry::publisher_defaults(), cfg.ui_types.clone())
            .with_host(Arc::clone(&host));
        factory.set_context(item.get("context").cloned().unwrap_or_else(|| cfg.context.clone()));
        factory.set_package(item.get("package").cloned().or_else(|| package.clone()));
        factory.set_definition_type(cfg.definition_type.clone());
        factory
    });
    let default_context = cfg
        .context
        .get("context_id")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let preparer = Arc::new(ContextPreparer::new(Arc::clone(&host), default_context));
    let queue = DefinitionRunQueue::new(host, preparer, QueueOptions::from(cfg));

    let title = definition
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("definition")
        .to_string();
    info!(items = items.len(), host_id = %cfg.host_id, definition = %title, "client ready");
    let mut state = AppState {
        title,
        items,
        queue: Some(queue),
        theme: crate::theme::Theme::synthwave_dark(),
        ..Default::default()
    };
    state.dbg(format!(
        "loaded {} item(s) for host {}",
        state.items.len(),
        cfg.host_id
    ));
    Ok(state)
}

/// One-line JSON result of a headless run.
pub(crate) fn headless_summary(state: &AppState) -> JsonValue {
    match state.last_summary {
        Some(s) => json!({
            "ok": s.failed == 0 && !s.aborted,
            "status": s.status(),
            "message": s.message(),
            "total": s.total,
            "succeeded": s.succeeded,
            "failed": s.failed,
            "aborted": s.aborted,
        }),
        None => json!({
            "ok": false,
            "message": state
                .progress
                .status()
                .map(|(_, m)| m.to_string())
                .unwrap_or_else(|| NOTHING_TO_RUN.to_string()),
        }),
    }
}

pub fn run() -> Result<()> {
    let headless = env_flag(HEADLESS_ENV);
    crate::logging::init_logging(headless)?;
    let loaded = load_client_config().context("loading pipeline-client.yaml")?;
    let mut state = build_state(&loaded)?;

    if headless {
        let timeout = std::env::var(HEADLESS_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend)?;
        let nap = Duration::from_millis(loaded.config.poll_interval_ms.min(200));
        let effects = update(&mut state, AppMsg::RunBatch);
        run_effects(&mut state, effects);
        let mut deadline = Instant::now() + timeout;
        let mut aborted = false;
        while state.is_running() {
            if Instant::now() >= deadline {
                if aborted {
                    warn!("batch did not stop after abort, giving up");
                    break;
                }
                warn!(?timeout, "headless run timed out, aborting");
                let effects = update(&mut state, AppMsg::AbortBatch);
                run_effects(&mut state, effects);
                aborted = true;
                deadline = Instant::now() + Duration::from_secs(30);
            }
            terminal.draw(|f| ui(f, &mut state))?;
            let effects = update(&mut state, AppMsg::Tick);
            run_effects(&mut state, effects);
            state.tick = state.tick.wrapping_add(1);
            std::thread::sleep(nap);
        }
        terminal.draw(|f| ui(f, &mut state))?;
        println!("{}", headless_summary(&state));
        return Ok(());
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if let Err(e) = terminal.draw(|f| ui(f, &mut state)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = event::read() {
                    let effects = handle_key(&mut state, key.code);
                    run_effects(&mut state, effects);
                }
            }
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
            let effects = update(&mut state, AppMsg::Tick);
            run_effects(&mut state, effects);
        }
        if state.should_quit {
            break Ok(());
        }
    };
    // Restore
    disable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    res
}

/// Route a key to the open widget or to the item list shortcuts.
pub(crate) fn handle_key(state: &mut AppState, key: KeyCode) -> Vec<Effect> {
    match state.view {
        View::Options => match state.options.as_mut() {
            Some(w) => w.on_key(key),
            None => update(state, AppMsg::CloseView),
        },
        View::Preview => match key {
            KeyCode::Char('y') => update(state, AppMsg::CopyDefinition),
            KeyCode::Char('q') => update(state, AppMsg::CloseView),
            _ => match state.preview.as_mut() {
                Some(w) => w.on_key(key),
                None => update(state, AppMsg::CloseView),
            },
        },
        View::Items => {
            let msg = match key {
                KeyCode::Up => AppMsg::SelectPrev,
                KeyCode::Down => AppMsg::SelectNext,
                KeyCode::Char(' ') => AppMsg::ToggleChecked,
                KeyCode::Char('o') | KeyCode::Enter => AppMsg::OpenOptions,
                KeyCode::Char('p') => AppMsg::OpenPreview,
                KeyCode::Char('y') => AppMsg::CopyDefinition,
                KeyCode::Char('r') => AppMsg::RunBatch,
                KeyCode::Char('x') => AppMsg::AbortBatch,
                KeyCode::Char('q') | KeyCode::Esc => AppMsg::Quit,
                _ => return Vec::new(),
            };
            update(state, msg)
        }
    }
}

fn help_text(state: &AppState) -> &'static str {
    match state.view {
        View::Options => {
            if state.options.as_ref().map(|o| o.is_editing()).unwrap_or(false) {
                "Enter save  Esc cancel"
            } else {
                "↑/↓ field  Enter edit  Space toggle  Esc store & back"
            }
        }
        View::Preview => "↑/↓ scroll  PgUp/PgDn  Home/End  w wrap  y copy  Esc back",
        View::Items => "↑/↓ select  Space check  o options  p preview  y copy  r run  x abort  q quit",
    }
}

fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }

    let screen = f.area();
    f.render_widget(Block::default().style(state.theme.base_style()), screen);

    const DEBUG_H: u16 = 4;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(DEBUG_H),
            Constraint::Length(1),
        ])
        .split(screen);

    draw_title(f, chunks[0], state);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);
    draw_items(f, main[0], state, state.view == View::Items);
    let tick = state.tick;
    match state.view {
        View::Items => draw_progress(f, main[1], &state.progress, &state.theme, false),
        View::Options => {
            if let Some(w) = state.options.as_mut() {
                w.render(f, main[1], true, tick);
            }
        }
        View::Preview => {
            if let Some(w) = state.preview.as_mut() {
                w.render(f, main[1], true, tick);
            }
        }
    }

    draw_debug(f, chunks[2], state);
    draw_footer_combined(f, chunks[3], state, help_text(state));
}

fn draw_title(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(
        format!(" {} ", state.title),
        state.theme.text_active_bold(),
    )];
    if let Some(s) = &state.last_summary {
        spans.push(Span::styled(
            s.message(),
            Style::default().fg(state.theme.status_color(Some(s.status()))),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height as usize;
    let total = state.debug_log.len();
    let start = total.saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::item::populate_items;
    use crate::services::testing::{publisher_definition, publisher_schema, ScriptedHost};
    use ratatui::backend::TestBackend;

    fn state_with(names: &[&str]) -> AppState {
        let host: Arc<dyn HostConnection> = Arc::new(ScriptedHost::new("h"));
        let items = populate_items(
            names.iter().map(|n| json!({"name": n, "context_id": "c"})).collect(),
            &publisher_definition(),
            Some(&publisher_schema()),
            |_| {
                WidgetFactory::new(OverrideRegistry::publisher_defaults(), vec!["tui".into()])
                    .with_host(Arc::clone(&host))
            },
        );
        let preparer = Arc::new(ContextPreparer::new(Arc::clone(&host), None));
        let options = QueueOptions {
            multithreading: false,
            ..Default::default()
        };
        AppState {
            title: "File Publisher".into(),
            items,
            queue: Some(DefinitionRunQueue::new(host, preparer, options)),
            ..Default::default()
        }
    }

    fn screen_text(state: &mut AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| ui(f, state)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn item_list_shows_check_boxes_and_counts() {
        let mut st = state_with(&["cube", "sphere"]);
        handle_key(&mut st, KeyCode::Down);
        handle_key(&mut st, KeyCode::Char(' '));
        let text = screen_text(&mut st);
        assert!(text.contains("Items (1/2)"));
        assert!(text.contains("[x] cube"));
        assert!(text.contains("[ ] sphere"));
        assert!(text.contains("File Publisher"));
    }

    #[test]
    fn headless_summary_reports_counts_or_nothing_to_run() {
        let mut st = state_with(&["cube"]);
        st.items[0].checked = false;
        let effects = update(&mut st, AppMsg::RunBatch);
        run_effects(&mut st, effects);
        let v = headless_summary(&st);
        assert_eq!(v["ok"], json!(false));
        assert_eq!(v["message"], json!(NOTHING_TO_RUN));

        st.items[0].checked = true;
        let effects = update(&mut st, AppMsg::RunBatch);
        run_effects(&mut st, effects);
        while st.is_running() {
            let effects = update(&mut st, AppMsg::Tick);
            run_effects(&mut st, effects);
        }
        let v = headless_summary(&st);
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["status"], json!("SUCCESS"));
        assert_eq!(v["total"], json!(1));
    }

    #[test]
    fn toasts_expire_by_tick() {
        let mut st = state_with(&["cube"]);
        show_toast(&mut st, "hello", ToastLevel::Info, 1);
        assert!(screen_text(&mut st).contains("[INFO] hello"));
        st.tick += 5;
        screen_text(&mut st);
        assert!(st.toast.is_none());
    }

    #[test]
    fn esc_in_preview_returns_to_items() {
        let mut st = state_with(&["cube"]);
        handle_key(&mut st, KeyCode::Char('p'));
        assert_eq!(st.view, View::Preview);
        assert!(screen_text(&mut st).contains("Definition: cube"));
        let effects = handle_key(&mut st, KeyCode::Esc);
        run_effects(&mut st, effects);
        assert_eq!(st.view, View::Items);
        assert!(st.preview.is_none());
    }
}
