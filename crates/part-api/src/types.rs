//! Request and response types for the PART API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

// ---------- Envelope ----------

/// Uniform response body: `{ data?, message? }`.
///
/// Unknown top-level fields are kept in `extra` so callers that asked for
/// the whole envelope see everything the server sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Project out `data`; `Value::Null` when the server sent none.
    pub fn into_data(self) -> Value {
        self.data.unwrap_or(Value::Null)
    }
}

/// Any JSON body is a valid envelope. Objects are split into `data`,
/// `message` and `extra`; a non-string `message` is kept as its JSON text.
/// Anything other than an object becomes `data`.
impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Self {
                    data: Some(other),
                    ..Self::default()
                };
            }
        };
        let data = fields.remove("data").filter(|data| !data.is_null());
        let message = match fields.remove("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message),
            Some(other) => Some(other.to_string()),
        };
        Self {
            data,
            message,
            extra: fields,
        }
    }
}

// ---------- Identifiers ----------

/// Server-side identifier. The API accepts numeric and string ids alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Integer(i64),
    String(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::String(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        Self::Integer(i64::from(id))
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        Self::Integer(i64::from(id))
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

// ---------- Request bodies ----------

/// Login body for `/authenticate`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct IdRequest<'a> {
    pub id: &'a ResourceId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SurveyIdRequest<'a> {
    pub survey_id: &'a ResourceId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SurveyResponseRequest<'a, R: Serialize> {
    pub survey_id: &'a ResourceId,
    pub response: &'a R,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluationRequest<'a, E: Serialize> {
    pub evaluation_data: &'a E,
}

// ---------- Uploads ----------

/// File contents sent as the multipart `file` field.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Keep at most the first `max_len` bytes.
    pub fn truncated(&self, max_len: usize) -> Self {
        let end = self.bytes.len().min(max_len);
        Self {
            file_name: self.file_name.clone(),
            bytes: self.bytes.slice(..end),
            mime: self.mime.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Bytes of the upload body handed to the connection so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Fraction in `0.0..=1.0`; an empty body counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

/// Called from the upload task as chunks are written.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;
