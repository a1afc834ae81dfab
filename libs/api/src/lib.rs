mod error;
mod record;
mod schema;

pub use error::{ErrorKind, RecordError, TelemetryError};
pub use record::Record;
pub use schema::{Field, FieldSchema, Selection};

// ════════════════════════════════════════════════════════════════
//  Wire Messages
// ════════════════════════════════════════════════════════════════

/// Payload token that marks the end of a replay.
pub const END_MARKER: &str = "END";

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `(label, value)` pairs in transmission order.
    Data(Vec<(String, String)>),
    /// The replay is over; no more data follows.
    End,
}

impl Message {
    /// Value of the first pair labelled `field`.
    pub fn value(&self, field: Field) -> Option<&str> {
        match self {
            Message::Data(pairs) => pairs
                .iter()
                .find(|(label, _)| label == field.label())
                .map(|(_, value)| value.as_str()),
            Message::End => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Transport Traits
// ════════════════════════════════════════════════════════════════

/// Bidirectional byte stream of one connection.
/// Implementations must support blocking Read and Write.
pub trait TransportStream: std::io::Read + std::io::Write + Send {
    /// Description of the remote side (for logging).
    fn peer_info(&self) -> String {
        "unknown".into()
    }
}

impl TransportStream for std::net::TcpStream {
    fn peer_info(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into())
    }
}

/// Source of connections, inbound (listener) or outbound (dialer).
///
/// All methods are **blocking**.
pub trait Transport: Send {
    /// Initialize the transport (bind, listen, validate config).
    fn start(&mut self) -> Result<(), TelemetryError>;

    /// Next connection. Blocks until one is ready.
    /// `None` = the transport is shut down and will not yield more.
    fn next_connection(&mut self) -> Result<Option<Box<dyn TransportStream>>, TelemetryError>;

    /// Stop the transport.
    fn stop(&mut self) -> Result<(), TelemetryError>;

    /// Bound or target address, once known.
    fn local_addr(&self) -> Option<String> {
        None
    }
}

/// Message boundaries in a byte stream.
///
/// Implementations are stateless: buffering belongs to the caller.
pub trait Framing: Send + Sync {
    /// Extract one frame from the start of `buf`.
    /// Returns `(frame, bytes_consumed)` or `None` if the frame is incomplete.
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, TelemetryError>;

    /// Append the framed `data` to `buf`.
    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), TelemetryError>;
}

/// Payload format: record → bytes on the sending side, bytes → message on
/// the receiving side. Framing is applied separately.
pub trait Codec: Send + Sync {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, RecordError>;

    /// Payload of the end-of-stream message.
    fn encode_end(&self) -> Vec<u8> {
        END_MARKER.as_bytes().to_vec()
    }

    fn decode(&self, data: &[u8]) -> Result<Message, TelemetryError>;
}
