//! Report types
//!
//! These mirror the JSON report written by `hurl --report-json`. Assertion and
//! capture results have runner-defined shapes and are kept as raw JSON.
//! See: https://hurl.dev/docs/running-tests.html#generating-report

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Full result of a run, one session per executed script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    pub sessions: Vec<Session>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// True when every session succeeded; an empty report is not a success
    pub fn success(&self) -> bool {
        !self.sessions.is_empty() && self.sessions.iter().all(|s| s.success)
    }

    /// Every call of every entry of every session, in order
    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.sessions
            .iter()
            .flat_map(|s| s.entries.iter())
            .flat_map(|e| e.calls.iter())
    }
}

impl From<Vec<Session>> for Report {
    fn from(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }
}

/// Result of executing one script file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub success: bool,
    /// Elapsed time in milliseconds
    #[serde(default)]
    pub time: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: Vec<Cookie>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<Entry>,
}

/// One request/response step of a script, with its asserts and captures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curl_cmd: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub asserts: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub captures: Vec<Value>,
    /// Physical exchanges; more than one when redirects are followed
    #[serde(default, deserialize_with = "null_as_default")]
    pub calls: Vec<Call>,
}

/// One physical HTTP request/response pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Call {
    #[serde(default)]
    pub request: Request,
    #[serde(default)]
    pub response: Response,
    #[serde(default)]
    pub timings: Timings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: Vec<Header>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string: Vec<QueryParam>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: Vec<Cookie>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub http_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: Vec<Header>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: Vec<Cookie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    /// Body file written by the runner, relative to the working directory
    #[serde(rename = "body", default, deserialize_with = "null_as_default")]
    pub body_file: String,
    /// Body bytes, filled in by rehydration
    #[serde(rename = "bodyContent", default, deserialize_with = "null_as_default")]
    pub body_content: String,
}

/// Phase durations in microseconds plus wall-clock begin/end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default)]
    pub begin_call: String,
    #[serde(default)]
    pub end_call: String,
    #[serde(default)]
    pub name_lookup: u64,
    #[serde(default)]
    pub connect: u64,
    #[serde(default)]
    pub app_connect: u64,
    #[serde(default)]
    pub pre_transfer: u64,
    #[serde(default)]
    pub start_transfer: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub expire_date: String,
}

/// Treat an explicit JSON `null` like a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
