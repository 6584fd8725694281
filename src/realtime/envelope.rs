use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelEvent {
    StartExam,
    UpdateAnswer,
    UpdateTime,
    SubmitExam,
}

/// One client message. `payload` is decoded per event so a malformed payload
/// still gets a reply carrying its `request_id`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    pub request_id: String,
    pub event: ChannelEvent,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<DateTime<Utc>>,
}

impl From<&AppError> for ReplyError {
    fn from(err: &AppError) -> Self {
        ReplyError {
            code: err.error_code(),
            message: err.public_message(),
            boundary: err.boundary(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub request_id: String,
    pub event: ChannelEvent,
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl Reply {
    pub fn success(request_id: String, event: ChannelEvent, data: Value) -> Self {
        Reply {
            request_id,
            event,
            status: ReplyStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(request_id: String, event: ChannelEvent, err: &AppError) -> Self {
        Reply {
            request_id,
            event,
            status: ReplyStatus::Error,
            data: None,
            error: Some(ReplyError::from(err)),
        }
    }
}
