//! JSON wire format for an out-of-process presentation layer.
//!
//! One request per line, tagged by `op`:
//!
//! ```text
//! {"id":1,"op":"listDevice","path":"/sdcard/DCIM"}
//! {"id":1,"op":"listDevice","result":{"success":true,"data":"Camera\n","error":null}}
//! ```
//!
//! Progress travels on the same stream as
//! `{"event":"progress","fileName":"a.mp4","progress":40,"speed":"12.0 MB/s"}`.

use engine::{ErrorKind, ProgressEvent, TransferResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::warn;

use crate::bridge::Bridge;
use crate::error::BridgeError;

/// One operation requested by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BridgeRequest {
    #[serde(rename_all = "camelCase")]
    QueryDeviceProperty { command: String },
    QueryStatus,
    PickDirectory,
    #[serde(rename_all = "camelCase")]
    ListDirectory { path: PathBuf },
    #[serde(rename_all = "camelCase")]
    ListDevice {
        #[serde(default)]
        path: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PushFile { path: PathBuf, file_name: String },
    #[serde(rename_all = "camelCase")]
    PullFile { file_name: String, path: PathBuf },
    #[serde(rename_all = "camelCase")]
    RawCommand { args: String },
}

impl BridgeRequest {
    /// Wire name of the operation, echoed in the response.
    pub fn op(&self) -> &'static str {
        match self {
            BridgeRequest::QueryDeviceProperty { .. } => "queryDeviceProperty",
            BridgeRequest::QueryStatus => "queryStatus",
            BridgeRequest::PickDirectory => "pickDirectory",
            BridgeRequest::ListDirectory { .. } => "listDirectory",
            BridgeRequest::ListDevice { .. } => "listDevice",
            BridgeRequest::PushFile { .. } => "pushFile",
            BridgeRequest::PullFile { .. } => "pullFile",
            BridgeRequest::RawCommand { .. } => "rawCommand",
        }
    }
}

/// A request line: the operation plus an optional correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub request: BridgeRequest,
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: Option<u64>,
    pub op: Option<String>,
    pub result: Value,
}

/// A progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNotice {
    pub event: String,

    #[serde(flatten)]
    pub progress: ProgressEvent,
}

impl From<&ProgressEvent> for ProgressNotice {
    fn from(event: &ProgressEvent) -> Self {
        ProgressNotice {
            event: "progress".to_string(),
            progress: event.clone(),
        }
    }
}

pub fn parse_request(line: &str) -> Result<RequestEnvelope, BridgeError> {
    Ok(serde_json::from_str(line)?)
}

/// Run one request and produce its result payload.
pub async fn dispatch(bridge: &Bridge, request: &BridgeRequest) -> Value {
    match request {
        BridgeRequest::QueryDeviceProperty { command } => result_value(&bridge.query_device_property(command).await),
        BridgeRequest::QueryStatus => to_value(&bridge.query_status().await),
        BridgeRequest::PickDirectory => json!({ "path": bridge.pick_directory().await }),
        BridgeRequest::ListDirectory { path } => to_value(&bridge.list_directory(path).await),
        BridgeRequest::ListDevice { path } => result_value(&bridge.list_device(path.as_deref()).await),
        BridgeRequest::PushFile { path, file_name } => result_value(&bridge.push_file(path, file_name).await),
        BridgeRequest::PullFile { file_name, path } => result_value(&bridge.pull_file(file_name, path).await),
        BridgeRequest::RawCommand { args } => result_value(&bridge.raw_command(args).await),
    }
}

/// Parse, run and encode one request line.
///
/// Malformed input is answered with a `PARSE_FAILURE` result rather than
/// dropped, so the caller can always pair requests with responses.
pub async fn handle_line(bridge: &Bridge, line: &str) -> BridgeResponse {
    match parse_request(line) {
        Ok(envelope) => BridgeResponse {
            id: envelope.id,
            op: Some(envelope.request.op().to_string()),
            result: dispatch(bridge, &envelope.request).await,
        },
        Err(e) => {
            warn!(error = %e, "rejecting request");
            BridgeResponse {
                id: request_id(line),
                op: None,
                result: result_value(&TransferResult::failure(ErrorKind::ParseFailure, e.to_string())),
            }
        }
    }
}

/// Best-effort id recovery from a line that failed to decode as a request.
fn request_id(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| value.get("id").and_then(Value::as_u64))
}

fn result_value(result: &TransferResult) -> Value {
    to_value(result)
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::FixedPicker;
    use async_trait::async_trait;
    use engine::{AppConfig, EngineError, ProcessInvoker, StreamingInvocation, ToolOutput};
    use std::sync::Arc;

    struct EchoAdb;

    #[async_trait]
    impl ProcessInvoker for EchoAdb {
        async fn invoke(&self, args: &[String]) -> Result<ToolOutput, EngineError> {
            Ok(ToolOutput::success(args.join(" ")))
        }

        fn invoke_streaming(&self, _args: &[String]) -> Result<StreamingInvocation, EngineError> {
            Err(EngineError::ToolNotFound { path: "adb".into() })
        }
    }

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(EchoAdb), AppConfig::default())
            .with_picker(Arc::new(FixedPicker::new(Some(PathBuf::from("/home/me/Music")))))
    }

    #[test]
    fn test_parse_requests() {
        let envelope = parse_request(r#"{"id":7,"op":"pushFile","path":"/home/me","fileName":"a.mp4"}"#).unwrap();
        assert_eq!(envelope.id, Some(7));
        assert_eq!(
            envelope.request,
            BridgeRequest::PushFile {
                path: PathBuf::from("/home/me"),
                file_name: "a.mp4".to_string(),
            }
        );

        let envelope = parse_request(r#"{"op":"listDevice"}"#).unwrap();
        assert_eq!(envelope.id, None);
        assert_eq!(envelope.request, BridgeRequest::ListDevice { path: None });

        assert!(parse_request(r#"{"op":"formatDisk"}"#).is_err());
        assert!(parse_request("not json").is_err());
    }

    #[test]
    fn test_progress_notice_shape() {
        let event = ProgressEvent {
            item: "a.mp4".to_string(),
            percent: 40,
            rate_label: "12.0 MB/s".to_string(),
        };
        let value = serde_json::to_value(ProgressNotice::from(&event)).unwrap();
        assert_eq!(
            value,
            json!({"event": "progress", "fileName": "a.mp4", "progress": 40, "speed": "12.0 MB/s"})
        );
    }

    #[tokio::test]
    async fn test_raw_command_round_trip() {
        let response = handle_line(&bridge(), r#"{"id":1,"op":"rawCommand","args":"devices -l"}"#).await;
        assert_eq!(response.id, Some(1));
        assert_eq!(response.op.as_deref(), Some("rawCommand"));
        assert_eq!(response.result["success"], json!(true));
        assert_eq!(response.result["data"], json!("devices -l"));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_parse_failure() {
        let response = handle_line(&bridge(), r#"{"id":3,"op":"nope"}"#).await;
        assert_eq!(response.id, Some(3));
        assert_eq!(response.result["success"], json!(false));
        assert_eq!(response.result["error"], json!("PARSE_FAILURE"));
    }

    #[tokio::test]
    async fn test_pick_directory_and_failed_push() {
        let response = handle_line(&bridge(), r#"{"op":"pickDirectory"}"#).await;
        assert_eq!(response.result, json!({"path": "/home/me/Music"}));

        let response = handle_line(&bridge(), r#"{"op":"pushFile","path":"/tmp","fileName":"a"}"#).await;
        assert_eq!(response.result["success"], json!(false));
        assert_eq!(response.result["error"], json!("PROCESS_FAILURE"));
    }
}
