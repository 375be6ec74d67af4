//! Message parts: the typed fragments (text / file / data) of a message body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// One fragment of a message body, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text {
        #[serde(default)]
        text: String,
    },
    File {
        file: FileContent,
    },
    /// Opaque structured payload, preserved verbatim.
    Data {
        #[serde(default)]
        data: Value,
    },
}

/// File reference carried by a [`Part::File`].
///
/// `bytes` is base64 (standard alphabet) on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        uri: Option<String>,
        bytes: Option<Vec<u8>>,
    ) -> Self {
        Part::File {
            file: FileContent {
                name: name.into(),
                mime_type: mime_type.into(),
                bytes,
                uri,
            },
        }
    }

    pub fn data(data: Value) -> Self {
        Part::Data { data }
    }

    /// The wire discriminator of this part.
    pub fn kind(&self) -> &'static str {
        match self {
            Part::Text { .. } => "text",
            Part::File { .. } => "file",
            Part::Data { .. } => "data",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileContent> {
        match self {
            Part::File { file } => Some(file),
            _ => None,
        }
    }

    /// Decode a single part from a raw JSON value.
    ///
    /// The `kind` must be exactly `text`, `file` or `data`; anything else
    /// yields [`ProtocolError::UnknownKind`].
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value.get("kind").and_then(Value::as_str) {
            Some("text" | "file" | "data") => Ok(serde_json::from_value(value)?),
            Some(other) => Err(ProtocolError::UnknownKind(other.to_string())),
            None => Err(ProtocolError::UnknownKind(String::new())),
        }
    }
}

/// Decode a part list, skipping every entry that fails to decode.
///
/// A malformed or unknown part never poisons the rest of the message.
pub(crate) fn lenient_parts<'de, D>(deserializer: D) -> Result<Vec<Part>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|v| Part::from_value(v).ok())
        .collect())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
