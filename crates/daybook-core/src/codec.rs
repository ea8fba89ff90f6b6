use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datekey::is_canonical;
use crate::history::History;
use crate::task::{Status, Task};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    InvalidDocument,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidDocument => f.write_str("Invalid task history file"),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    version: u32,
    exported_at: String,
    selected_date: &'a str,
    history: &'a History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imported {
    pub history: History,
    pub selected_date: String,
    pub dropped_buckets: usize,
    pub repaired_tasks: usize,
}

#[tracing::instrument(skip(history))]
pub fn export_document(
    history: &History,
    selected_date: &str,
    exported_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let doc = ExportDocument {
        version: FORMAT_VERSION,
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        selected_date,
        history,
    };
    let out = serde_json::to_string_pretty(&doc)?;
    debug!(
        buckets = history.dates().count(),
        tasks = history.total_tasks(),
        bytes = out.len(),
        "exported task history"
    );
    Ok(out)
}

pub fn export_file_name(selected_date: &str) -> String {
    format!("tasks-{selected_date}.json")
}

/// Parses an exported document, repairing what can be repaired. Only a
/// document that is not an object with a `history` object is rejected.
#[tracing::instrument(skip(text))]
pub fn import_document(text: &str, today: &str) -> Result<Imported, CodecError> {
    let root: Value = serde_json::from_str(text).map_err(|err| {
        warn!(error = %err, "import is not valid JSON");
        CodecError::InvalidDocument
    })?;
    let Some(doc) = root.as_object() else {
        warn!("import root is not an object");
        return Err(CodecError::InvalidDocument);
    };
    let Some(raw_history) = doc.get("history").and_then(Value::as_object) else {
        warn!("import has no history object");
        return Err(CodecError::InvalidDocument);
    };

    let now_ms = now_millis();
    let mut buckets = BTreeMap::new();
    let mut dropped_buckets = 0;
    let mut repaired_tasks = 0;

    for (key, value) in raw_history {
        let Some(items) = value.as_array() else {
            debug!(date = %key, "dropping bucket that is not a list");
            dropped_buckets += 1;
            continue;
        };
        if !is_canonical(key) {
            debug!(date = %key, "dropping bucket with non-canonical key");
            dropped_buckets += 1;
            continue;
        }

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(items.len());
        for item in items {
            let Some(fields) = item.as_object() else {
                debug!(date = %key, "skipping task entry that is not an object");
                repaired_tasks += 1;
                continue;
            };
            let (task, repaired) = rebuild_task(fields, now_ms, &seen);
            if repaired {
                repaired_tasks += 1;
            }
            seen.insert(task.id);
            tasks.push(task);
        }
        buckets.insert(key.clone(), tasks);
    }

    let mut history = History::from_buckets(buckets);
    if history.is_empty() {
        debug!(today, "no usable buckets; starting at today");
        history.ensure_bucket(today);
    }

    let selected_date = doc
        .get("selectedDate")
        .and_then(Value::as_str)
        .filter(|key| is_canonical(key))
        .map(str::to_string)
        .or_else(|| history.first_date().map(str::to_string))
        .unwrap_or_else(|| today.to_string());
    history.ensure_bucket(&selected_date);

    info!(
        buckets = history.dates().count(),
        tasks = history.total_tasks(),
        dropped_buckets,
        repaired_tasks,
        selected = %selected_date,
        "imported task history"
    );

    Ok(Imported {
        history,
        selected_date,
        dropped_buckets,
        repaired_tasks,
    })
}

fn rebuild_task(fields: &Map<String, Value>, now_ms: u64, taken: &HashSet<u64>) -> (Task, bool) {
    let mut repaired = false;

    let id = match fields.get("id").and_then(coerce_id) {
        Some(id) if !taken.contains(&id) => id,
        _ => {
            repaired = true;
            synthesize_id(now_ms, taken)
        }
    };

    let text = match fields.get("text") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        other => {
            if other.is_some_and(|value| !value.is_null()) {
                repaired = true;
            }
            String::new()
        }
    };

    let status = match fields.get("status").and_then(Value::as_str).and_then(Status::from_wire) {
        Some(status) => status,
        None => {
            repaired = true;
            Status::Todo
        }
    };

    let series_id = match fields.get("seriesId") {
        Some(Value::String(series)) => Some(series.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    (
        Task {
            id,
            text,
            status,
            series_id,
        },
        repaired,
    )
}

fn coerce_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64)
                .map(|f| f.trunc() as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn synthesize_id(now_ms: u64, taken: &HashSet<u64>) -> u64 {
    let offset = (Uuid::new_v4().as_u128() % 1000) as u64;
    let mut id = now_ms.saturating_add(offset);
    while taken.contains(&id) {
        id = id.wrapping_add(1);
    }
    id
}

pub(crate) fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{CodecError, export_document, export_file_name, import_document};
    use crate::history::History;
    use crate::task::{Status, Task};

    const TODAY: &str = "2024-06-15";

    fn sample_history() -> History {
        let mut history = History::new();
        history.insert_task("2024-01-01", Task::new_todo(1, "write report".into(), None));
        let mut done = Task::new_todo(2, "gym".into(), Some("series-a".into()));
        done.status = Status::Completed;
        history.insert_task("2024-01-01", done);
        history.insert_task("2024-01-03", Task::new_todo(3, "gym".into(), Some("series-a".into())));
        history.ensure_bucket("2024-01-02");
        history
    }

    #[test]
    fn export_has_documented_shape() {
        let at = Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .expect("valid instant");
        let text = export_document(&sample_history(), "2024-01-01", at).expect("export");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");

        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], "2024-01-02T03:04:05.000Z");
        assert_eq!(value["selectedDate"], "2024-01-01");
        assert_eq!(value["history"]["2024-01-01"][1]["status"], "completed");
        assert_eq!(value["history"]["2024-01-01"][1]["seriesId"], "series-a");
        assert!(value["history"]["2024-01-01"][0].get("seriesId").is_none());
        assert!(text.contains("\n  \"history\""));
    }

    #[test]
    fn export_then_import_reproduces_state() {
        let history = sample_history();
        let text = export_document(&history, "2024-01-03", Utc::now()).expect("export");
        let imported = import_document(&text, TODAY).expect("import");

        assert_eq!(imported.history, history);
        assert_eq!(imported.selected_date, "2024-01-03");
        assert_eq!(imported.dropped_buckets, 0);
        assert_eq!(imported.repaired_tasks, 0);
    }

    #[test]
    fn rejects_documents_without_history_object() {
        for text in [
            "not json",
            "[]",
            "42",
            r#"{"version": 1}"#,
            r#"{"history": []}"#,
            r#"{"history": "2024-01-01"}"#,
        ] {
            assert_eq!(
                import_document(text, TODAY),
                Err(CodecError::InvalidDocument),
                "input: {text}"
            );
        }
        assert_eq!(CodecError::InvalidDocument.to_string(), "Invalid task history file");
    }

    #[test]
    fn drops_bad_keys_and_non_list_buckets() {
        let text = json!({
            "history": {
                "bad-key": [{"id": 1, "text": "x", "status": "todo"}],
                "2024-02-30": [],
                "2024-01-05": {"id": 2},
                "2024-01-06": [{"id": 3, "text": "kept", "status": "ongoing"}]
            }
        })
        .to_string();
        let imported = import_document(&text, TODAY).expect("import");

        let dates: Vec<&String> = imported.history.dates().collect();
        assert_eq!(dates, vec!["2024-01-06"]);
        assert_eq!(imported.dropped_buckets, 3);
        assert_eq!(imported.selected_date, "2024-01-06");
    }

    #[test]
    fn empty_history_falls_back_to_today() {
        let imported = import_document(r#"{"history": {}}"#, TODAY).expect("import");
        let dates: Vec<&String> = imported.history.dates().collect();
        assert_eq!(dates, vec![TODAY]);
        assert!(imported.history.bucket(TODAY).is_empty());
        assert_eq!(imported.selected_date, TODAY);
    }

    #[test]
    fn repairs_task_fields() {
        let text = json!({
            "selectedDate": "someday",
            "history": {
                "2024-01-01": [
                    {"id": 10, "text": "no status"},
                    {"id": 11, "text": "archived", "status": "archived"},
                    {"text": 5, "status": "completed", "seriesId": 77},
                    {"id": "12", "status": "ongoing", "seriesId": {"nested": true}},
                    {"id": 10, "text": "duplicate id", "status": "todo"},
                    "not a task"
                ]
            }
        })
        .to_string();
        let imported = import_document(&text, TODAY).expect("import");
        let tasks = imported.history.bucket("2024-01-01");

        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].status, Status::Todo);
        assert_eq!(tasks[1].status, Status::Todo);
        assert_eq!(tasks[2].text, "5");
        assert_eq!(tasks[2].status, Status::Completed);
        assert_eq!(tasks[2].series_id.as_deref(), Some("77"));
        assert!(tasks[2].id > 1_000_000);
        assert_eq!(tasks[3].id, 12);
        assert_eq!(tasks[3].text, "");
        assert_eq!(tasks[3].series_id, None);
        assert_ne!(tasks[4].id, 10);

        let mut ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), tasks.len());

        assert_eq!(imported.selected_date, "2024-01-01");
    }

    #[test]
    fn selected_date_gets_a_bucket() {
        let text = json!({
            "selectedDate": "2024-03-03",
            "history": {"2024-01-01": []}
        })
        .to_string();
        let imported = import_document(&text, TODAY).expect("import");
        assert_eq!(imported.selected_date, "2024-03-03");
        assert!(imported.history.contains_date("2024-03-03"));
    }

    #[test]
    fn file_name_carries_date() {
        assert_eq!(export_file_name("2024-01-01"), "tasks-2024-01-01.json");
    }
}
