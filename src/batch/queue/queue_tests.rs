use super::*;
use crate::batch::item::populate_items;
use crate::batch::prepare::ContextPreparer;
use crate::batch::progress::ProgressLog;
use crate::factory::registry::OverrideRegistry;
use crate::factory::WidgetFactory;
use crate::services::host::Envelope;
use crate::services::testing::{publisher_definition, publisher_schema, ScriptedHost};
use serde_json::json;
use std::thread;
use std::time::Instant;

const WAIT: Duration = Duration::from_secs(10);

fn items_for(
    host: &Arc<ScriptedHost>,
    payloads: Vec<JsonValue>,
    source: JsonValue,
    schema: Option<&JsonValue>,
) -> Vec<RunItem> {
    let shared: Arc<dyn HostConnection> = host.clone();
    populate_items(payloads, &source, schema, |_| {
        WidgetFactory::new(OverrideRegistry::publisher_defaults(), vec!["tui".into()])
            .with_host(Arc::clone(&shared))
    })
}

fn named(n: usize) -> Vec<JsonValue> {
    (0..n)
        .map(|i| json!({"name": format!("asset{i}"), "context_id": format!("ctx{i}")}))
        .collect()
}

fn queue_for(host: &Arc<ScriptedHost>, threaded: bool) -> DefinitionRunQueue {
    let shared: Arc<dyn HostConnection> = host.clone();
    DefinitionRunQueue::new(
        Arc::clone(&shared),
        Arc::new(ContextPreparer::new(shared, None)),
        QueueOptions {
            multithreading: threaded,
            poll_interval: Duration::from_millis(5),
            engine_type: None,
        },
    )
}

fn finished(updates: &[QueueUpdate]) -> Option<BatchSummary> {
    updates.iter().find_map(|u| match u {
        QueueUpdate::Finished(s) => Some(*s),
        _ => None,
    })
}

#[test]
fn nothing_checked_stays_idle() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut items = items_for(&host, named(2), publisher_definition(), None);
    items.iter_mut().for_each(|i| i.checked = false);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    assert_eq!(q.run(&mut items, &mut log), vec![QueueUpdate::NothingToRun]);
    assert_eq!(q.phase(), QueuePhase::Idle);
    assert_eq!(log.status().map(|(s, _)| s), Some(Status::Warning));
    assert_eq!(host.run_count(), 0);
}

#[test]
fn all_items_succeed_on_the_worker() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut items = items_for(&host, named(3), publisher_definition(), None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    let mut updates = q.run(&mut items, &mut log);
    // item row plus context, two components and two finalizer stages
    assert_eq!(log.rows().len(), 3 * 6);
    updates.extend(q.wait(&mut items, &mut log, WAIT));

    let summary = finished(&updates).expect("batch should finish");
    assert_eq!(
        summary,
        BatchSummary {
            total: 3,
            succeeded: 3,
            failed: 0,
            aborted: false
        }
    );
    assert_eq!(host.run_count(), 3);
    assert_eq!(q.phase(), QueuePhase::Done);
    for item in &items {
        let row = log.row(&StepKey::item(item.label.clone(), item.item_id.clone())).unwrap();
        assert_eq!(row.status, Some(Status::Success));
    }
    assert_eq!(log.status().map(|(_, m)| m.to_string()), Some(summary.message()));
}

#[test]
fn items_run_in_list_order_with_their_context() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut items = items_for(&host, named(3), publisher_definition(), None);
    items[1].checked = false;
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    q.run(&mut items, &mut log);
    q.wait(&mut items, &mut log, WAIT);
    let runs = host.runs.lock().unwrap().clone();
    let contexts: Vec<&str> = runs
        .iter()
        .filter_map(|d| d["contexts"][0]["stages"][0]["plugins"][0]["options"]["context_id"].as_str())
        .collect();
    assert_eq!(contexts, vec!["ctx0", "ctx2"]);
}

#[test]
fn one_prepare_failure_is_partial_success() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut payloads = named(4);
    payloads[1] = json!({"name": "orphan"});
    let mut items = items_for(&host, payloads, publisher_definition(), None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    let mut updates = q.run(&mut items, &mut log);
    updates.extend(q.wait(&mut items, &mut log, WAIT));

    let summary = finished(&updates).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.status(), Status::Warning);
    assert_eq!(host.run_count(), 3);
    let orphan = log
        .row(&StepKey::item("orphan", items[1].item_id.clone()))
        .unwrap();
    assert_eq!(orphan.status, Some(Status::Error));
    assert!(orphan.message.contains("no context_id"));
}

#[test]
fn execution_failure_keeps_traceback() {
    let host = Arc::new(ScriptedHost::new("h").on_run(|_, _| Envelope {
        traceback: Some("Traceback (most recent call last):\n  ...".into()),
        ..Envelope::failure(Status::Exception, "export crashed")
    }));
    let mut items = items_for(&host, named(1), publisher_definition(), None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    let mut updates = q.run(&mut items, &mut log);
    updates.extend(q.wait(&mut items, &mut log, WAIT));

    let summary = finished(&updates).unwrap();
    assert_eq!(summary.status(), Status::Error);
    assert_eq!(summary.message(), "Could not publish asset - check logs for more information!");
    let row = log
        .row(&StepKey::item("asset0", items[0].item_id.clone()))
        .unwrap();
    assert_eq!(row.message, "export crashed");
    assert!(row.traceback.as_deref().unwrap().starts_with("Traceback"));
}

#[test]
fn abort_after_first_item_stops_scheduling() {
    let host = Arc::new(ScriptedHost::new("h").on_run(|_, _| {
        thread::sleep(Duration::from_millis(20));
        Envelope::success(JsonValue::Null)
    }));
    let mut items = items_for(&host, named(5), publisher_definition(), None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    q.run(&mut items, &mut log);

    let deadline = Instant::now() + WAIT;
    let mut first_done = false;
    while !first_done && Instant::now() < deadline {
        first_done = q
            .pump(&mut items, &mut log)
            .iter()
            .any(|u| matches!(u, QueueUpdate::ItemFinished { .. }));
        thread::sleep(Duration::from_millis(1));
    }
    assert!(first_done);
    let cleared = q.abort();
    assert!(cleared >= 3);
    assert_eq!(q.phase(), QueuePhase::Aborting);

    let updates = q.wait(&mut items, &mut log, WAIT);
    let summary = finished(&updates).unwrap();
    assert!(host.run_count() <= 2);
    assert!(summary.aborted);
    assert_eq!(summary.total, summary.succeeded + summary.failed);
    assert_eq!(summary.failed, 0);
    assert!(updates.iter().any(|u| matches!(u, QueueUpdate::Aborted { .. })));
}

#[test]
fn inline_mode_runs_on_the_caller() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut items = items_for(&host, named(3), publisher_definition(), None);
    let mut q = queue_for(&host, false);
    let mut log = ProgressLog::default();
    q.run(&mut items, &mut log);
    assert_eq!(q.in_flight(), Some(items[0].item_id.as_str()));
    assert_eq!(host.run_count(), 0);
    q.pump(&mut items, &mut log);
    assert_eq!(host.run_count(), 1);
    let updates = q.wait(&mut items, &mut log, WAIT);
    assert_eq!(finished(&updates).map(|s| s.succeeded), Some(3));
}

#[test]
fn plugin_error_notification_fails_the_item() {
    let host = Arc::new(ScriptedHost::new("h").on_run(|def, notifier| {
        let r = def["components"][0]["stages"][0]["plugins"][0]["widget_ref"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        notifier.notify(&r, Status::Running, "collecting");
        notifier.notify(&r, Status::Error, "nothing selected");
        Envelope::success(JsonValue::Null)
    }));
    let schema = publisher_schema();
    let mut items = items_for(&host, named(2), publisher_definition(), Some(&schema));
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    let mut updates = q.run(&mut items, &mut log);
    updates.extend(q.wait(&mut items, &mut log, WAIT));

    let summary = finished(&updates).unwrap();
    assert_eq!(summary.failed, 2);
    let row = log
        .row(&StepKey::new("component", "snapshot", items[0].item_id.clone()))
        .unwrap();
    assert_eq!(row.status, Some(Status::Error));
    assert_eq!(row.message, "nothing selected");
    assert!(!items[0].factory.is_listening());
}

#[test]
fn missing_engine_fails_before_the_host_is_called() {
    let host = Arc::new(ScriptedHost::new("h"));
    let mut source = publisher_definition();
    if let Some(obj) = source.as_object_mut() {
        obj.remove("_config");
    }
    let mut items = items_for(&host, named(1), source, None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    let mut updates = q.run(&mut items, &mut log);
    updates.extend(q.wait(&mut items, &mut log, WAIT));
    assert_eq!(finished(&updates).map(|s| s.failed), Some(1));
    assert_eq!(host.run_count(), 0);
}

#[test]
fn run_is_ignored_while_busy() {
    let host = Arc::new(ScriptedHost::new("h").on_run(|_, _| {
        thread::sleep(Duration::from_millis(20));
        Envelope::success(JsonValue::Null)
    }));
    let mut items = items_for(&host, named(2), publisher_definition(), None);
    let mut q = queue_for(&host, true);
    let mut log = ProgressLog::default();
    q.run(&mut items, &mut log);
    assert!(q.run(&mut items, &mut log).is_empty());
    q.wait(&mut items, &mut log, WAIT);
    assert_eq!(host.run_count(), 2);
}
