//! Builders for outbound responses and the inbound request parser.
//!
//! Builders are deterministic apart from the correlation IDs they mint
//! via [`generate_id`].

use chrono::Utc;
use rand::Rng;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::part::Part;
use crate::request::{InboundRequest, MessageBody};
use crate::response::{
    ArtifactPayload, ArtifactUpdate, ClearContextResult, JsonRpcError, JsonRpcResponse,
    PushUpdate, ResultPayload, StateOnly, StatusPayload, StatusUpdate, TaskState,
    TasksCancelResult,
};
use crate::JSONRPC_VERSION;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 9;

/// Correlation ID: `<unix millis>_<9 lowercase alphanumerics>`.
///
/// Best-effort unique; not suitable where unpredictability matters.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}_{suffix}", Utc::now().timestamp_millis())
}

/// Parse an inbound request frame.
///
/// Fails when the outer JSON, `params`, or `params.message` cannot be
/// decoded.  Individual parts that fail to decode are dropped.
pub fn parse_inbound_request(bytes: &[u8]) -> Result<InboundRequest, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn response(id: impl Into<String>, result: ResultPayload) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.into(),
        id: id.into(),
        result: Some(result),
        error: None,
    }
}

/// Artifact chunk.  `is_final` sets both `final` and `lastChunk`.
pub fn artifact_response(
    message_id: &str,
    task_id: &str,
    parts: Vec<Part>,
    is_final: bool,
    append: bool,
) -> JsonRpcResponse {
    response(
        message_id,
        ResultPayload::ArtifactUpdate(ArtifactUpdate {
            task_id: task_id.into(),
            append,
            last_chunk: is_final,
            is_final,
            artifact: ArtifactPayload {
                artifact_id: generate_id(),
                parts,
            },
        }),
    )
}

/// Non-final status update with a single agent text part.
pub fn status_response(
    message_id: &str,
    task_id: &str,
    text: &str,
    state: TaskState,
) -> JsonRpcResponse {
    response(
        message_id,
        ResultPayload::StatusUpdate(StatusUpdate {
            task_id: task_id.into(),
            is_final: false,
            status: StatusPayload {
                message: MessageBody::agent(vec![Part::text(text)]),
                state,
            },
        }),
    )
}

pub fn error_response(message_id: &str, code: Value, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.into(),
        id: message_id.into(),
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

pub fn clear_context_response(request_id: &str, success: bool) -> JsonRpcResponse {
    let state = if success { "cleared" } else { "failed" };
    response(
        request_id,
        ResultPayload::ClearContext(ClearContextResult {
            status: StateOnly::new(state),
        }),
    )
}

pub fn tasks_cancel_response(request_id: &str, success: bool) -> JsonRpcResponse {
    let state = if success { "canceled" } else { "failed" };
    response(
        request_id,
        ResultPayload::TasksCancel(TasksCancelResult {
            id: request_id.into(),
            status: StateOnly::new(state),
        }),
    )
}

pub fn push_response(
    message_id: &str,
    task_id: &str,
    push_text: &str,
    parts: Vec<Part>,
) -> JsonRpcResponse {
    response(
        message_id,
        ResultPayload::Push(PushUpdate {
            id: task_id.into(),
            push_id: generate_id(),
            push_text: push_text.into(),
            artifacts: vec![ArtifactPayload {
                artifact_id: generate_id(),
                parts,
            }],
            status: StateOnly::new("completed"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{MsgType, OutboundEnvelope};
    use serde_json::json;

    const SAMPLE: &str = r#"{"jsonrpc":"2.0","id":"r1","method":"message/send","agentId":"a1","sessionId":"s1","params":{"id":"t1","message":{"role":"user","parts":[{"kind":"text","text":"hello"}]}}}"#;

    #[test]
    fn parses_sample_request() {
        let req = parse_inbound_request(SAMPLE.as_bytes()).unwrap();
        assert_eq!(req.session_id(), "s1");
        assert_eq!(req.task_id(), "t1");
        assert_eq!(req.text(), "hello");
        assert_eq!(req.agent_id, "a1");
        assert_eq!(req.method, "message/send");
    }

    #[test]
    fn reply_to_sample_keeps_task_and_session() {
        let req = parse_inbound_request(SAMPLE.as_bytes()).unwrap();
        let resp = artifact_response(
            &generate_id(),
            req.task_id(),
            vec![Part::text("Echo: hello")],
            true,
            false,
        );
        let env =
            OutboundEnvelope::agent_response("a1", req.session_id(), req.task_id(), &resp).unwrap();
        let wire: OutboundEnvelope = serde_json::from_str(&env.to_json().unwrap()).unwrap();

        assert_eq!(wire.msg_type, MsgType::AgentResponse);
        assert_eq!(wire.session_id.as_deref(), Some("s1"));
        assert_eq!(wire.task_id.as_deref(), Some("t1"));

        let inner = wire.detail().unwrap().unwrap();
        match inner.result.unwrap() {
            ResultPayload::ArtifactUpdate(update) => {
                assert_eq!(update.task_id, "t1");
                assert!(update.is_final);
                assert!(update.last_chunk);
                assert!(!update.append);
                assert_eq!(update.artifact.parts, vec![Part::text("Echo: hello")]);
            }
            other => panic!("expected artifact update, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_fails() {
        assert!(matches!(
            parse_inbound_request(b"{not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn missing_params_fails() {
        assert!(parse_inbound_request(br#"{"id":"r","method":"m"}"#).is_err());
    }

    #[test]
    fn missing_message_fails() {
        assert!(parse_inbound_request(br#"{"id":"r","method":"m","params":{"id":"t"}}"#).is_err());
    }

    #[test]
    fn bad_parts_are_skipped_not_fatal() {
        let raw = json!({
            "id": "r", "method": "message/send",
            "params": {"id": "t", "message": {"role": "user", "parts": [
                {"kind": "video", "src": "x"},
                {"kind": "text", "text": "kept"},
                "not an object",
                {"kind": "file", "file": {"name": "f", "mimeType": "m", "bytes": "%%%"}},
                {"kind": "data", "data": {"k": 1}}
            ]}}
        });
        let req = parse_inbound_request(raw.to_string().as_bytes()).unwrap();
        assert_eq!(req.parts(), &[Part::text("kept"), Part::data(json!({"k": 1}))]);
    }

    #[test]
    fn status_response_shape() {
        let resp = status_response("m", "t", "thinking", TaskState::Working);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v["result"],
            json!({
                "taskId": "t", "kind": "status-update", "final": false,
                "status": {"message": {"role": "agent", "parts": [{"kind": "text", "text": "thinking"}]}, "state": "working"}
            })
        );
    }

    #[test]
    fn clear_and_cancel_states() {
        let v = serde_json::to_value(clear_context_response("r", true)).unwrap();
        assert_eq!(v["result"], json!({"status": {"state": "cleared"}}));
        let v = serde_json::to_value(clear_context_response("r", false)).unwrap();
        assert_eq!(v["result"]["status"]["state"], "failed");

        let v = serde_json::to_value(tasks_cancel_response("r", true)).unwrap();
        assert_eq!(v["result"], json!({"id": "r", "status": {"state": "canceled"}}));
        let v = serde_json::to_value(tasks_cancel_response("r", false)).unwrap();
        assert_eq!(v["result"]["status"]["state"], "failed");
    }

    #[test]
    fn push_shape() {
        let resp = push_response("m", "push_m", "news", vec![Part::text("news")]);
        let v = serde_json::to_value(&resp).unwrap();
        let result = &v["result"];
        assert_eq!(result["id"], "push_m");
        assert_eq!(result["kind"], "task");
        assert_eq!(result["pushText"], "news");
        assert_eq!(result["status"], json!({"state": "completed"}));
        assert_eq!(result["artifacts"][0]["parts"][0], json!({"kind": "text", "text": "news"}));
        assert!(result["pushId"].is_string());
    }

    #[test]
    fn error_response_has_no_result() {
        let v = serde_json::to_value(error_response("m", json!("E42"), "bad")).unwrap();
        assert_eq!(v, json!({"jsonrpc": "2.0", "id": "m", "error": {"code": "E42", "message": "bad"}}));
    }

    #[test]
    fn generated_id_format() {
        let id = generate_id();
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 9);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(generate_id(), generate_id());
    }
}
