/// Errors produced while decoding protocol messages.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown kind: {0}")]
    UnknownKind(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}
