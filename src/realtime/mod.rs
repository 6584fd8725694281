//! Transport-agnostic request/response channel for students sitting an exam.

pub mod dispatcher;
pub mod envelope;

pub use dispatcher::ChannelDispatcher;
pub use envelope::{ChannelEvent, Envelope, Reply, ReplyError, ReplyStatus};
