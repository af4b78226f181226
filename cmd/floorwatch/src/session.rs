//! JSON-lines request handling.
//!
//! Each input line is one request tagged by `op`; each produces exactly
//! one output line, `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": "..."}`.

use std::collections::BTreeMap;

use floorwatch_monitor::Monitor;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CheckDuplicate {
        embedding: Vec<f32>,
    },
    Identify {
        embedding: Vec<f32>,
    },
    /// Without `location_id` the location is looked up from `source`.
    Observe {
        embedding: Vec<f32>,
        source: String,
        #[serde(default)]
        location_id: Option<i64>,
        #[serde(default)]
        confidence: Option<f32>,
    },
    Present {
        location_id: i64,
    },
    Occupancy,
    ClearLocation {
        location_id: i64,
    },
    Reassign {
        assignments: BTreeMap<String, i64>,
    },
    RemoveSource {
        source: String,
    },
    Status,
    Refresh,
}

/// Handles one input line and returns the response line.
pub async fn handle_line(monitor: &Monitor, line: &str) -> String {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(req) => match handle(monitor, req).await {
            Ok(result) => json!({"ok": true, "result": result}),
            Err(e) => json!({"ok": false, "error": e.to_string()}),
        },
        Err(e) => json!({"ok": false, "error": format!("bad request: {e}")}),
    };
    response.to_string()
}

async fn handle(monitor: &Monitor, req: Request) -> anyhow::Result<Value> {
    let value = match req {
        Request::CheckDuplicate { embedding } => serde_json::to_value(monitor.check_duplicate(&embedding)?)?,
        Request::Identify { embedding } => serde_json::to_value(monitor.identify(&embedding)?)?,
        Request::Observe {
            embedding,
            source,
            location_id,
            confidence,
        } => {
            let seen = match location_id {
                Some(location_id) => monitor.observe(&embedding, location_id, &source, confidence)?,
                None => monitor.observe_from_source(&embedding, &source, confidence)?,
            };
            serde_json::to_value(seen)?
        }
        Request::Present { location_id } => serde_json::to_value(monitor.present(location_id))?,
        Request::Occupancy => serde_json::to_value(monitor.occupancy())?,
        Request::ClearLocation { location_id } => json!({"removed": monitor.clear_location(location_id)}),
        Request::Reassign { assignments } => serde_json::to_value(monitor.reassign_sources(assignments))?,
        Request::RemoveSource { source } => json!({"location_id": monitor.remove_source(&source)}),
        Request::Status => serde_json::to_value(monitor.status())?,
        Request::Refresh => serde_json::to_value(monitor.refresh().await?)?,
    };
    Ok(value)
}
