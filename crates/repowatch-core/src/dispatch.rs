use thiserror::Error;

use crate::render::Line;

#[derive(Error, Debug)]
#[error("delivery to {channel} failed: {reason}")]
pub struct DispatchError {
    pub channel: String,
    pub reason: String,
}

/// Delivery boundary. Receives rendered lines with opaque color/emphasis
/// markers and owns the wire encoding (IRC control bytes, ANSI, plain
/// text). There is no durable outbox behind this: a failed dispatch is
/// logged and the batch is dropped, never retried.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, channel: &str, lines: &[Line]) -> Result<(), DispatchError>;
}
