use std::sync::Arc;

use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    errors::{AppError, AppResult},
    realtime::envelope::{ChannelEvent, Envelope, Reply},
    services::ExamAttemptService,
};

fn decode<T: DeserializeOwned>(payload: Value) -> AppResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| AppError::ValidationError(format!("Invalid payload: {}", e)))
}

fn encode<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::InternalError(format!("Failed to encode reply: {}", e)))
}

/// Routes channel envelopes to the attempt state machine on behalf of one student.
#[derive(Clone)]
pub struct ChannelDispatcher {
    attempts: Arc<ExamAttemptService>,
}

impl ChannelDispatcher {
    pub fn new(attempts: Arc<ExamAttemptService>) -> Self {
        Self { attempts }
    }

    pub async fn handle(&self, student_id: &str, envelope: Envelope) -> Reply {
        let Envelope {
            request_id,
            event,
            payload,
        } = envelope;

        match self.route(student_id, event, payload).await {
            Ok(data) => Reply::success(request_id, event, data),
            Err(e) => {
                log::warn!(
                    "Channel {:?} {} for student {} rejected: {}",
                    event,
                    request_id,
                    student_id,
                    e
                );
                Reply::failure(request_id, event, &e)
            }
        }
    }

    /// Handles every envelope concurrently; replies come back in request order.
    pub async fn handle_all(&self, student_id: &str, envelopes: Vec<Envelope>) -> Vec<Reply> {
        join_all(
            envelopes
                .into_iter()
                .map(|envelope| self.handle(student_id, envelope)),
        )
        .await
    }

    async fn route(&self, student_id: &str, event: ChannelEvent, payload: Value) -> AppResult<Value> {
        match event {
            ChannelEvent::StartExam => {
                let view = self.attempts.start(student_id, decode(payload)?).await?;
                encode(&view)
            }
            ChannelEvent::UpdateAnswer => {
                let ack = self.attempts.sync_answers(student_id, decode(payload)?).await?;
                encode(&ack)
            }
            ChannelEvent::UpdateTime => {
                let ack = self.attempts.sync_time(student_id, decode(payload)?).await?;
                encode(&ack)
            }
            ChannelEvent::SubmitExam => {
                let outcome = self.attempts.submit(student_id, decode(payload)?).await?;
                encode(&outcome)
            }
        }
    }
}
