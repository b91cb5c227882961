//! Typed stream chunks and the worker→orchestrator pipe.
//!
//! The streaming worker is the only other actor in the process; every byte
//! it produces crosses this bounded channel as a [`StreamChunk`]. The
//! orchestrator is the single consumer and drains in production order.

use tokio::sync::mpsc;

use crate::message::ToolCall;

/// One typed unit of streaming output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Reasoning-text delta.
    Thinking(String),
    /// Visible-content delta.
    Content(String),
    /// A complete batch of tool calls.
    ToolCalls(Vec<ToolCall>),
    /// Terminal chunk; exactly one per request.
    Done(StreamEnd),
}

/// Payload of the terminal chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamEnd {
    /// Present when the stream ended in a fault (connection refused,
    /// protocol error, malformed JSON, server error body, timeout).
    pub error: Option<String>,
}

impl StreamEnd {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
        }
    }
}

pub type ChunkSender = mpsc::Sender<StreamChunk>;
pub type ChunkReceiver = mpsc::Receiver<StreamChunk>;

/// Create the bounded pipe for one streaming request.
pub fn chunk_pipe() -> (ChunkSender, ChunkReceiver) {
    mpsc::channel(crate::constants::STREAM_PIPE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipe_preserves_production_order() {
        let (tx, mut rx) = chunk_pipe();
        tx.send(StreamChunk::Content("a".into())).await.unwrap();
        tx.send(StreamChunk::Content("b".into())).await.unwrap();
        tx.send(StreamChunk::Done(StreamEnd::ok())).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(StreamChunk::Content("a".into())));
        assert_eq!(rx.recv().await, Some(StreamChunk::Content("b".into())));
        assert_eq!(rx.recv().await, Some(StreamChunk::Done(StreamEnd::ok())));
        assert_eq!(rx.recv().await, None);
    }
}
