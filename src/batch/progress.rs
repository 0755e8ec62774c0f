use crate::model::Status;
use std::collections::HashMap;

/// Step type of the per-item row.
pub const ITEM_STEP: &str = "item";

/// Progress rows are keyed by step type, label and the item they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    pub step_type: String,
    pub label: String,
    pub batch_id: String,
}

impl StepKey {
    pub fn new(step_type: impl Into<String>, label: impl Into<String>, batch_id: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            label: label.into(),
            batch_id: batch_id.into(),
        }
    }

    pub fn item(label: impl Into<String>, batch_id: impl Into<String>) -> Self {
        Self::new(ITEM_STEP, label, batch_id)
    }
}

/// Sink for batch progress. The run queue only ever adds and updates rows.
pub trait ProgressAggregator {
    fn add_step(&mut self, key: StepKey);
    fn update_step(&mut self, key: &StepKey, status: Status, message: &str, traceback: Option<&str>);
    /// Overall status line of the batch.
    fn set_status(&mut self, status: Status, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub key: StepKey,
    pub status: Option<Status>,
    pub message: String,
    pub traceback: Option<String>,
}

/// In-memory progress table backing the progress pane.
#[derive(Debug, Default)]
pub struct ProgressLog {
    rows: Vec<ProgressRow>,
    index: HashMap<StepKey, usize>,
    status: Option<(Status, String)>,
}

impl ProgressLog {
    pub fn rows(&self) -> &[ProgressRow] {
        &self.rows
    }

    pub fn row(&self, key: &StepKey) -> Option<&ProgressRow> {
        self.index.get(key).and_then(|&i| self.rows.get(i))
    }

    pub fn status(&self) -> Option<(Status, &str)> {
        self.status.as_ref().map(|(s, m)| (*s, m.as_str()))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
        self.status = None;
    }
}

impl ProgressAggregator for ProgressLog {
    fn add_step(&mut self, key: StepKey) {
        if self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(ProgressRow {
            key,
            status: None,
            message: String::new(),
            traceback: None,
        });
    }

    fn update_step(&mut self, key: &StepKey, status: Status, message: &str, traceback: Option<&str>) {
        let idx = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.add_step(key.clone());
                self.rows.len() - 1
            }
        };
        if let Some(row) = self.rows.get_mut(idx) {
            row.status = Some(status);
            row.message = message.to_string();
            if let Some(tb) = traceback {
                row.traceback = Some(tb.to_string());
            }
        }
    }

    fn set_status(&mut self, status: Status, message: &str) {
        self.status = Some((status, message.to_string()));
    }
}
