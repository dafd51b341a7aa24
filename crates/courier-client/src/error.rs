use std::sync::Arc;

use courier_core::Fault;
use thiserror::Error;

/// Envelope-level failures raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Server answered with a non-success status and no decodable body.
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },
    /// HTTP client failed before a response was received.
    #[error("request failed: {0}")]
    Request(String),
    /// Request encoding failed.
    #[error("failed to encode json payload: {0}")]
    Encode(String),
    /// Response decoding failed.
    #[error("failed to decode json payload: {0}")]
    Decode(String),
    /// Operation exceeded configured timeout.
    #[error("request timed out")]
    Timeout,
}

/// What a caller awaiting one submitted request can observe.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The server rejected this request.
    #[error("server fault: {0}")]
    Fault(#[from] Fault),
    /// The wire call carrying this request failed as a whole.
    #[error("transport error: {0}")]
    Transport(Arc<TransportError>),
    /// The response carried no usable item for this request.
    #[error("malformed response for item {index}: {detail}")]
    MalformedResponse { index: usize, detail: String },
    /// The batcher dropped the request before answering.
    #[error("request was canceled before completion")]
    Canceled,
    /// Submitted outside of a tokio runtime.
    #[error("no async runtime available to dispatch request")]
    NoRuntime,
    /// Batchable request submitted on a runtime that cannot bound a turn.
    #[error("batchable requests need a current-thread runtime")]
    UnsupportedRuntime,
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Arc::new(err))
    }
}
