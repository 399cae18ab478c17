//! Stream Controller models.
//!
//! Contains the wire types of the control surface and the stream
//! configuration payload stored by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope status for a successful operation.
pub const STATUS_SUCCESS: u8 = 1;

/// Envelope status for a failed operation.
pub const STATUS_FAILURE: u8 = 0;

/// Payload returned by mutating endpoints on success.
pub const SUCCESS_MARKER: &str = "success";

/// Uniform response envelope used by every stream endpoint.
///
/// ```json
/// { "status": 1, "payload": "success" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// `1` on success, `0` on failure.
    pub status: u8,

    /// Result data on success, error text on failure.
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn success(payload: T) -> Self {
        Self {
            status: STATUS_SUCCESS,
            payload,
        }
    }

    pub fn failure(payload: T) -> Self {
        Self {
            status: STATUS_FAILURE,
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

impl Envelope<String> {
    /// The `{status: 1, payload: "success"}` marker.
    pub fn ok() -> Self {
        Self::success(SUCCESS_MARKER.to_string())
    }
}

/// Configuration of one stream.
///
/// The registry treats everything except the optional display `name` as an
/// opaque settings object; identity comes from the key it is stored under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Human readable stream name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Remaining settings (channels, URLs, flags...).
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl StreamConfig {
    /// Config with only a display name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            settings: serde_json::Map::new(),
        }
    }

    /// Builder-style setter for an opaque setting.
    #[cfg(test)]
    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// Batch add request body.
///
/// Accepts either a bare `{key: config}` mapping or the wrapped
/// `{"streams": {key: config}}` form. A body whose only key is `"streams"`
/// is read as the wrapped form first, so `{"streams": {}}` is an empty batch;
/// it falls back to a bare stream named `streams` only if the wrapped reading
/// does not parse.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchAddRequest {
    Wrapped(Option<BTreeMap<String, StreamConfig>>),
    Bare(BTreeMap<String, StreamConfig>),
}

impl<'de> Deserialize<'de> for BatchAddRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let body = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;

        if body.len() == 1 {
            if let Some(inner) = body.get(WRAPPED_STREAMS_KEY) {
                match serde_json::from_value(inner.clone()) {
                    Ok(streams) => return Ok(BatchAddRequest::Wrapped(streams)),
                    Err(wrapped_err) => {
                        return serde_json::from_value(serde_json::Value::Object(body))
                            .map(BatchAddRequest::Bare)
                            .map_err(|_| D::Error::custom(wrapped_err));
                    }
                }
            }
        }

        serde_json::from_value(serde_json::Value::Object(body))
            .map(BatchAddRequest::Bare)
            .map_err(D::Error::custom)
    }
}

/// Key of the wrapped batch add form.
pub const WRAPPED_STREAMS_KEY: &str = "streams";

impl BatchAddRequest {
    /// Flatten into the key-ordered mapping of streams to admit.
    pub fn into_streams(self) -> BTreeMap<String, StreamConfig> {
        match self {
            BatchAddRequest::Wrapped(streams) => streams.unwrap_or_default(),
            BatchAddRequest::Bare(streams) => streams,
        }
    }
}

/// Registry view of one stream, as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamListing {
    pub config: StreamConfig,
    pub admitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle state of a stream runner as reported by the stream processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Running,
    /// Registered, but the runner has not been started yet.
    Pending,
}

/// Runner status reported by the stream processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerStatus {
    pub state: RunnerState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Number of reloads since the runner was (re)started with a new config.
    pub restarts: u32,
}

/// Full stream info returned by `GET /stream/:key/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub key: String,
    pub config: StreamConfig,
    pub admitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub runner: RunnerStatus,
}

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,

    /// Identifier of this controller instance.
    pub instance_id: String,

    /// Number of streams currently registered.
    pub streams: usize,

    /// Configured capacity of the registry.
    pub max_streams: usize,
}
