use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One request line: `{"op": "...", "payload": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestFrame {
    pub op: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultFrame {
    pub code: String,
    pub message: String,
}

/// One reply line: `{"ok": ...}` or `{"fault": {"code": "...", "message": "..."}}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyFrame {
    Ok(Value),
    Fault(FaultFrame),
}
