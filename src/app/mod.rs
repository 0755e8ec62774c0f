use crate::batch::queue::QueueUpdate;
use crate::batch::summary::NOTHING_TO_RUN;
use crate::factory::rows::{collect_rows, RowTarget};
use crate::model::Status;
use crate::ui::{AppState, ToastLevel, View};
use crate::widgets::json_preview::JsonPreview;
use crate::widgets::options_view::OptionsView;
use tracing::{info, warn};

pub enum AppMsg {
    SelectPrev,
    SelectNext,
    ToggleChecked,
    OpenOptions,
    OpenPreview,
    CloseView,
    EditRow {
        target: RowTarget,
        text: Option<String>,
    },
    CopyDefinition,
    RunBatch,
    AbortBatch,
    Tick,
    Quit,
}

#[derive(Debug)]
pub enum Effect {
    /// Apply an edit from the options form; `None` flips a check box.
    EditRow {
        target: RowTarget,
        text: Option<String>,
    },
    CloseView,
    CopyToClipboard {
        text: String,
    },
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    Quit,
}

fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds: 3,
    }
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        SelectPrev => {
            state.selected = state.selected.saturating_sub(1);
        }
        SelectNext => {
            if state.selected + 1 < state.items.len() {
                state.selected += 1;
            }
        }
        ToggleChecked => {
            if state.is_running() {
                effects.push(toast("Batch is running", ToastLevel::Info));
            } else if let Some(item) = state.items.get_mut(state.selected) {
                item.checked = !item.checked;
            }
        }
        OpenOptions => open_options(state, &mut effects),
        OpenPreview => {
            if let Some(item) = state.items.get(state.selected) {
                match serde_json::to_string_pretty(&item.current_definition()) {
                    Ok(text) => {
                        state.preview = Some(JsonPreview::new(item.label.clone(), text));
                        state.view = View::Preview;
                    }
                    Err(e) => effects.push(toast(e.to_string(), ToastLevel::Error)),
                }
            }
        }
        CloseView => close_view(state),
        EditRow { target, text } => apply_edit(state, target, text, &mut effects),
        CopyDefinition => {
            if let Some(item) = state.items.get(state.selected) {
                match serde_json::to_string_pretty(&item.current_definition()) {
                    Ok(text) => effects.push(Effect::CopyToClipboard { text }),
                    Err(e) => effects.push(toast(e.to_string(), ToastLevel::Error)),
                }
            }
        }
        RunBatch => {
            if state.is_running() {
                effects.push(toast("Batch is already running", ToastLevel::Info));
                return effects;
            }
            // Edits in an open form belong to the run
            if state.view == View::Options {
                close_view(state);
            }
            state.progress.clear();
            state.last_summary = None;
            let updates = match state.queue.as_mut() {
                Some(q) => q.run(&mut state.items, &mut state.progress),
                None => {
                    effects.push(toast("No host connection", ToastLevel::Error));
                    return effects;
                }
            };
            apply_queue_updates(state, updates, &mut effects);
        }
        AbortBatch => {
            if let Some(q) = state.queue.as_mut().filter(|q| q.is_busy()) {
                let cleared = q.abort();
                state.dbg(format!("abort requested, {cleared} queued item(s) dropped"));
                effects.push(toast(
                    format!("Aborting: {cleared} queued item(s) dropped"),
                    ToastLevel::Info,
                ));
            }
        }
        Tick => {
            let updates = match state.queue.as_mut() {
                Some(q) if q.is_busy() => q.pump(&mut state.items, &mut state.progress),
                _ => Vec::new(),
            };
            apply_queue_updates(state, updates, &mut effects);
            // Plugin status lands on the factory; keep the open form current
            if let (Some(view), Some(item)) = (state.options.as_mut(), state.items.get(state.selected)) {
                view.set_rows(collect_rows(&item.factory));
            }
        }
        Quit => {
            if state.is_running() {
                if let Some(q) = state.queue.as_mut() {
                    q.abort();
                }
                effects.push(toast(
                    "Batch aborted, press q again once it stops",
                    ToastLevel::Info,
                ));
            } else {
                effects.push(Effect::Quit);
            }
        }
    }
    effects
}

fn open_options(state: &mut AppState, effects: &mut Vec<Effect>) {
    let Some(item) = state.items.get_mut(state.selected) else {
        return;
    };
    if !item.has_schema() {
        effects.push(toast(
            "No schema configured, options are read-only",
            ToastLevel::Info,
        ));
        return;
    }
    if let Err(e) = item.ensure_built() {
        let msg = format!("Could not build options for {}: {e}", item.label);
        warn!(item = %item.item_id, error = %e, "options build failed");
        state.dbg(msg.clone());
        effects.push(toast(msg, ToastLevel::Error));
        return;
    }
    let view = OptionsView::new(item.label.clone(), collect_rows(&item.factory));
    state.options = Some(view);
    state.view = View::Options;
}

fn close_view(state: &mut AppState) {
    match state.view {
        View::Options => {
            if let Some(item) = state.items.get_mut(state.selected) {
                if item.store_options().is_some() {
                    info!(item = %item.item_id, "options stored");
                    let msg = format!("stored options for {}", item.label);
                    state.dbg(msg);
                }
            }
            state.options = None;
        }
        View::Preview => state.preview = None,
        View::Items => {}
    }
    state.view = View::Items;
}

fn apply_edit(
    state: &mut AppState,
    target: RowTarget,
    text: Option<String>,
    effects: &mut Vec<Effect>,
) {
    let Some(item) = state.items.get_mut(state.selected) else {
        return;
    };
    let factory = &mut item.factory;
    let result = match (&target, text) {
        (RowTarget::Leaf(path), Some(text)) => factory.set_leaf_text(path, &text),
        (RowTarget::Toggle(path), _) => factory
            .toggle(path)
            .map(|_| ())
            .ok_or_else(|| "not a check box".to_string()),
        (RowTarget::PluginOption { widget_ref, key }, Some(text)) => {
            if factory.set_plugin_option(widget_ref, key, &text) {
                Ok(())
            } else {
                Err(format!("plugin widget for '{key}' is gone"))
            }
        }
        _ => Ok(()),
    };
    let rows = collect_rows(factory);
    if let Some(view) = state.options.as_mut() {
        view.set_rows(rows);
    }
    if let Err(e) = result {
        effects.push(toast(e, ToastLevel::Error));
    }
}

fn apply_queue_updates(state: &mut AppState, updates: Vec<QueueUpdate>, effects: &mut Vec<Effect>) {
    for update in updates {
        match update {
            QueueUpdate::NothingToRun => {
                effects.push(toast(NOTHING_TO_RUN, ToastLevel::Info));
            }
            QueueUpdate::Started { total } => {
                let plural = if total > 1 { "s" } else { "" };
                state.status_text = Some(format!("Publishing {total} item{plural}"));
                state.dbg(format!("batch started: {total} item{plural}"));
            }
            QueueUpdate::ItemStarted { label, .. } => {
                state.dbg(format!("publishing {label}"));
            }
            QueueUpdate::ItemFinished {
                item_id,
                success,
                message,
            } => {
                let label = state
                    .items
                    .iter()
                    .find(|i| i.item_id == item_id)
                    .map(|i| i.label.clone())
                    .unwrap_or(item_id);
                if success {
                    state.dbg(format!("{label}: published"));
                } else {
                    state.dbg(format!("{label}: {message}"));
                }
            }
            QueueUpdate::Aborted { cleared } => {
                state.dbg(format!("batch aborted, {cleared} item(s) not run"));
            }
            QueueUpdate::Finished(summary) => {
                state.status_text = None;
                state.last_summary = Some(summary);
                let level = match summary.status() {
                    Status::Success => ToastLevel::Success,
                    Status::Warning => ToastLevel::Info,
                    _ => ToastLevel::Error,
                };
                state.dbg(summary.message());
                effects.push(Effect::ShowToast {
                    text: summary.message(),
                    level,
                    seconds: 5,
                });
            }
        }
    }
}
