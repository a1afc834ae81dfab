use telemetry_api::{ErrorKind, RecordError, TelemetryError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("listen on {addr}: {source}")]
    Bind { addr: String, source: TelemetryError },

    #[error("{0}")]
    Record(#[from] RecordError),

    #[error("accept: {0}")]
    Accept(TelemetryError),

    #[error("transport closed while waiting for a client")]
    TransportClosed,

    #[error("wire: {0}")]
    Wire(#[from] TelemetryError),

    #[error("stream closed before end marker")]
    UnexpectedEof,

    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },
}

impl PipelineError {
    /// A single payload failed to decode; the stream itself is intact.
    pub fn is_bad_frame(&self) -> bool {
        matches!(self, PipelineError::Wire(e) if e.kind() == ErrorKind::Format)
    }
}
