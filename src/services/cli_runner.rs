use crate::error::HostError;
use crate::model::Status;
use crate::services::event_hub::{EventHub, StatusUpdate, WIDGET_UPDATE_TOPIC};
use crate::services::host::{classify, Envelope, HostConnection, WidgetRequest};
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::{collections::HashMap, env};
use tracing::{debug, info, warn};

fn env_var_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Z0-9_]+)\}").ok())
        .as_ref()
}

pub(crate) fn expand_cmdline_env(cmdline: &str) -> String {
    // Expand ${VAR} from environment; special-case ${HOST_BIN}
    // -> PIPELINE_HOST_BIN (quoted if contains whitespace) or default "pipeline-host"
    let Some(re) = env_var_pattern() else {
        return cmdline.to_string();
    };
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        if key == "HOST_BIN" {
            if let Some(v) = env_map.get("PIPELINE_HOST_BIN") {
                // Quote if contains whitespace to keep it a single arg in shlex::split
                let needs_quote = v.chars().any(|c| c.is_whitespace());
                if needs_quote {
                    let escaped = v.replace('"', "\\\"");
                    return format!("\"{escaped}\"");
                }
                return v.to_string();
            }
            return "pipeline-host".to_string();
        }
        env_map.get(key).cloned().unwrap_or_default()
    })
    .to_string()
}

pub(crate) fn split_cmdline(cmdline: &str) -> Result<Vec<String>, HostError> {
    let expanded = expand_cmdline_env(cmdline);
    let parts = shlex::split(&expanded)
        .ok_or_else(|| HostError::CommandLine(format!("unbalanced quoting in '{expanded}'")))?;
    if parts.is_empty() {
        return Err(HostError::CommandLine("empty command line".to_string()));
    }
    Ok(parts)
}

/// Host reached by spawning a command per request.
///
/// The request payload is written as one JSON document on stdin. The host
/// answers with JSON lines on stdout: `{"type":"notification","data":{..}}`
/// lines are published as widget status updates while the call is running,
/// the last other line is the result envelope.
pub struct CliHost {
    id: String,
    cmdline: String,
    host_definitions: Vec<String>,
    hub: Arc<EventHub>,
}

impl CliHost {
    pub fn new(
        id: impl Into<String>,
        cmdline: impl Into<String>,
        host_definitions: Vec<String>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            id: id.into(),
            cmdline: cmdline.into(),
            host_definitions,
            hub,
        }
    }

    fn call(&self, subcommand: &[&str], payload: &JsonValue) -> Result<Option<Envelope>, HostError> {
        let parts = split_cmdline(&self.cmdline)?;
        let program = &parts[0];
        let args = &parts[1..];
        debug!(host_id = %self.id, program = %program, ?subcommand, "spawning host");
        let mut child = Command::new(program)
            .args(args)
            .args(subcommand)
            .env("PIPELINE_CLIENT_JSON", "1")
            .env("PIPELINE_HOST_ID", &self.id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HostError::Process(format!("spawning {program}: {e}")))?;

        let body = payload.to_string();
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                let _ = stdin.write_all(body.as_bytes());
                let _ = stdin.write_all(b"\n");
            })
        });
        // Drain stderr on its own thread so a chatty host cannot block on it
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let mut final_result: Option<JsonValue> = None;
        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                let l = line.trim();
                if l.is_empty() {
                    continue;
                }
                let Ok(v) = serde_json::from_str::<JsonValue>(l) else {
                    debug!(host_id = %self.id, line = l, "ignoring non-JSON host output");
                    continue;
                };
                let typ = v.get("type").and_then(|s| s.as_str()).unwrap_or("result");
                if typ == "notification" {
                    self.publish_notification(v.get("data").cloned().unwrap_or(JsonValue::Null));
                } else {
                    final_result = Some(v);
                }
            }
        }

        let status = child.wait();
        if let Some(w) = writer {
            let _ = w.join();
        }
        let stderr_text = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let success = status.as_ref().map(|s| s.success()).unwrap_or(false);

        match final_result {
            Some(JsonValue::Null) => Ok(None),
            Some(v) => serde_json::from_value::<Envelope>(v)
                .map(Some)
                .map_err(|e| HostError::Protocol(e.to_string())),
            None if !success => Err(HostError::Process(format!(
                "{} {} failed: {}",
                self.cmdline,
                subcommand.join(" "),
                stderr_text.trim()
            ))),
            None => Ok(None),
        }
    }

    fn publish_notification(&self, data: JsonValue) {
        match serde_json::from_value::<StatusUpdate>(data) {
            Ok(mut update) => {
                if update.host_id.is_empty() {
                    update.host_id = self.id.clone();
                }
                self.hub.publish(WIDGET_UPDATE_TOPIC, update);
            }
            Err(e) => warn!(host_id = %self.id, error = %e, "dropping malformed notification"),
        }
    }
}

impl HostConnection for CliHost {
    fn id(&self) -> &str {
        &self.id
    }

    fn host_definitions(&self) -> &[String] {
        &self.host_definitions
    }

    fn events(&self) -> Arc<EventHub> {
        Arc::clone(&self.hub)
    }

    fn request_widget(&self, req: &WidgetRequest) -> Result<Option<Envelope>, HostError> {
        let payload =
            serde_json::to_value(req).map_err(|e| HostError::Protocol(e.to_string()))?;
        self.call(&["widget"], &payload)
    }

    fn run_definition(
        &self,
        definition: &JsonValue,
        engine_type: &str,
    ) -> Result<Envelope, HostError> {
        info!(host_id = %self.id, engine_type, "running definition");
        self.call(&["run", "--engine", engine_type], definition)?
            .ok_or_else(|| HostError::Protocol("host returned no result for run".to_string()))
    }

    fn ensure_context(&self, parent_id: &str, name: &str) -> Result<String, HostError> {
        let env = self
            .call(&["context"], &json!({"parent_id": parent_id, "name": name}))?
            .unwrap_or_else(|| Envelope::failure(Status::Error, "no context returned"));
        let result = classify(env).map_err(|e| HostError::Protocol(e.message))?;
        result
            .get("context_id")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| HostError::Protocol("context result has no context_id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_bin_defaults_when_unset() {
        // PIPELINE_HOST_BIN is not set in the test environment
        if env::var("PIPELINE_HOST_BIN").is_err() {
            assert_eq!(expand_cmdline_env("${HOST_BIN} serve"), "pipeline-host serve");
        }
        assert_eq!(
            expand_cmdline_env("x ${PIPELINE_CLIENT_SURELY_UNSET_VAR} y"),
            "x  y"
        );
    }

    #[test]
    fn split_rejects_empty_and_unbalanced() {
        assert!(matches!(
            split_cmdline("   "),
            Err(HostError::CommandLine(_))
        ));
        assert!(matches!(
            split_cmdline("host \"unterminated"),
            Err(HostError::CommandLine(_))
        ));
        assert_eq!(
            split_cmdline("host --flag 'a b'").unwrap(),
            vec!["host".to_string(), "--flag".to_string(), "a b".to_string()]
        );
    }

    #[cfg(unix)]
    #[test]
    fn notifications_are_published_and_last_line_is_result() {
        use crate::services::event_hub::TopicFilter;
        let hub = EventHub::new();
        let sub = hub.subscribe(TopicFilter::widget_updates("h1"));
        let script = r#"sh -c 'cat >/dev/null; echo "{\"type\":\"notification\",\"data\":{\"widget_ref\":\"w1\",\"status\":\"RUNNING\"}}"; echo "{\"status\":\"SUCCESS\",\"result\":{\"ok\":true}}"'"#;
        let host = CliHost::new("h1", script, vec!["python".into()], Arc::clone(&hub));
        let env = host
            .run_definition(&serde_json::json!({}), "publisher")
            .unwrap();
        assert_eq!(env.status, Status::Success);
        assert_eq!(env.result["ok"], serde_json::json!(true));
        let got = sub.drain();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].widget_ref, "w1");
        assert_eq!(got[0].host_id, "h1");
    }
}
