use crate::types::{NodeRunId, RunId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: Timestamp,
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRunEvent {
    pub node_run_id: NodeRunId,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: Timestamp,
    pub data: Value,
}

/// Renders records as newline-delimited JSON, one record per line.
pub fn encode_ndjson<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_ndjson_run_event_expected_type_field_and_trailing_newline() {
        let event = RunEvent {
            run_id: "run-1".to_string(),
            seq: 0,
            event_type: "run_started".to_string(),
            time: chrono::Utc::now(),
            data: serde_json::json!({"message": "placeholder"}),
        };

        let encoded = encode_ndjson(&[event]).expect("event should encode");
        assert!(encoded.ends_with('\n'));
        assert_eq!(encoded.lines().count(), 1);

        let decoded: Value =
            serde_json::from_str(encoded.trim_end()).expect("line should be valid json");
        assert_eq!(decoded["type"], "run_started");
        assert_eq!(decoded["seq"], 0);
        assert_eq!(decoded["run_id"], "run-1");
    }
}
