//! The ZADT_VSP message schema: JSON requests with a domain/action pair and
//! id-correlated responses, either flat (`success`/`data`/`error`) or the
//! streamed variants (`progress`, `chunk`, `complete`, `error`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Service domains the APC endpoint exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsDomain {
    Rfc,
    Debug,
    Amdp,
    Git,
    Report,
}

impl WsDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            WsDomain::Rfc => "rfc",
            WsDomain::Debug => "debug",
            WsDomain::Amdp => "amdp",
            WsDomain::Git => "git",
            WsDomain::Report => "report",
        }
    }
}

/// An outgoing request frame.
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest {
    pub id: String,
    pub domain: WsDomain,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Server-side deadline in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(rename = "chunkSize", skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

/// Any incoming frame. The variants share one wire shape; [`WsServerMessage::payload`]
/// sorts them out.
#[derive(Debug, Clone, Deserialize)]
pub struct WsServerMessage {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<WsErrorBody>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub done: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "totalChunks", default)]
    pub total_chunks: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Decoded view of one incoming frame.
#[derive(Debug, Clone)]
pub enum WsPayload {
    /// Flat reply: `success` with optional data.
    Reply(Value),
    /// Streamed progress: (done, total, message).
    Progress(u64, u64, Option<String>),
    /// One chunk of a streamed binary payload (base64 text).
    Chunk(u64, String),
    /// Stream end: chunk count plus optional inline data for unchunked
    /// results.
    Complete(u64, Option<Value>),
    Error { code: String, message: String },
}

impl WsServerMessage {
    pub fn payload(self) -> WsPayload {
        match self.kind.as_deref() {
            Some("progress") => WsPayload::Progress(
                self.done.unwrap_or(0),
                self.total.unwrap_or(0),
                self.message,
            ),
            Some("chunk") => WsPayload::Chunk(
                self.seq.unwrap_or(0),
                self.data
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
            ),
            Some("complete") => WsPayload::Complete(self.total_chunks.unwrap_or(0), self.data),
            Some("error") => {
                let error = self.error.unwrap_or(WsErrorBody {
                    code: "ERROR".into(),
                    message: self.message.unwrap_or_default(),
                });
                WsPayload::Error {
                    code: error.code,
                    message: error.message,
                }
            }
            _ => {
                if self.success == Some(false) || self.error.is_some() {
                    let error = self.error.unwrap_or(WsErrorBody {
                        code: "ERROR".into(),
                        message: "request failed".into(),
                    });
                    WsPayload::Error {
                        code: error.code,
                        message: error.message,
                    }
                } else {
                    WsPayload::Reply(self.data.unwrap_or(Value::Null))
                }
            }
        }
    }
}

/// Payload of the single unsolicited `id: "welcome"` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WelcomeInfo {
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

/// An asynchronous event frame (debugger breaks and friends) delivered on
/// the events channel.
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub id: String,
    pub kind: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialization_skips_absent_fields() {
        let request = WsRequest {
            id: "amdp_1".into(),
            domain: WsDomain::Amdp,
            action: "start".into(),
            params: Some(json!({"user": "DEVELOPER"})),
            timeout: Some(60000),
            stream: None,
            chunk_size: None,
        };
        let text = serde_json::to_string(&request).unwrap();
        assert!(text.contains(r#""domain":"amdp""#));
        assert!(!text.contains("stream"));
        assert!(!text.contains("chunkSize"));

        let streamed = WsRequest {
            id: "git_2".into(),
            domain: WsDomain::Git,
            action: "export".into(),
            params: None,
            timeout: None,
            stream: Some(true),
            chunk_size: Some(5_242_880),
        };
        let text = serde_json::to_string(&streamed).unwrap();
        assert!(text.contains(r#""chunkSize":5242880"#));
    }

    #[test]
    fn flat_reply_decoding() {
        let message: WsServerMessage =
            serde_json::from_str(r#"{"id":"rfc_1","success":true,"data":{"rows":2}}"#).unwrap();
        match message.payload() {
            WsPayload::Reply(value) => assert_eq!(value["rows"], 2),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn flat_error_decoding() {
        let message: WsServerMessage = serde_json::from_str(
            r#"{"id":"rfc_1","success":false,"error":{"code":"NOT_FOUND","message":"no such report"}}"#,
        )
        .unwrap();
        match message.payload() {
            WsPayload::Error { code, message } => {
                assert_eq!(code, "NOT_FOUND");
                assert_eq!(message, "no such report");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn streamed_variant_decoding() {
        let progress: WsServerMessage = serde_json::from_str(
            r#"{"id":"git_1","type":"progress","done":3,"total":10,"message":"serializing"}"#,
        )
        .unwrap();
        assert!(matches!(
            progress.payload(),
            WsPayload::Progress(3, 10, Some(_))
        ));

        let chunk: WsServerMessage =
            serde_json::from_str(r#"{"id":"git_1","type":"chunk","seq":2,"data":"QUJD"}"#).unwrap();
        match chunk.payload() {
            WsPayload::Chunk(2, data) => assert_eq!(data, "QUJD"),
            other => panic!("unexpected payload {other:?}"),
        }

        let complete: WsServerMessage =
            serde_json::from_str(r#"{"id":"git_1","type":"complete","totalChunks":4}"#).unwrap();
        assert!(matches!(complete.payload(), WsPayload::Complete(4, None)));
    }

    #[test]
    fn welcome_parsing() {
        let welcome: WelcomeInfo = serde_json::from_str(
            r#"{"session":"S1","version":"1.4.0","domains":["rfc","amdp","git","report"]}"#,
        )
        .unwrap();
        assert_eq!(welcome.session, "S1");
        assert_eq!(welcome.domains.len(), 4);
    }
}
