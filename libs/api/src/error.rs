use crate::schema::Field;

/// Category of a transport/framing error. Allows the caller to decide
/// between recovering in place (reconnect) and failing fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or unusable endpoint: permanent, fails at startup.
    Config,
    /// I/O or network error: transient, may reconnect.
    Io,
    /// Bad frame or payload.
    Format,
    /// Transport used in an invalid state.
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Error returned by the transport, framing and codec seams.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the kind automatically so `?` works across I/O calls.
#[derive(Clone)]
pub struct TelemetryError {
    kind: ErrorKind,
    message: String,
}

impl TelemetryError {
    /// Configuration error: permanent, fails at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// I/O error: transient, may reconnect.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    /// Wire format error.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    /// Operation called in the wrong state, e.g. before `start`.
    pub fn logic(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TelemetryError {}

impl From<std::io::Error> for TelemetryError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<std::str::Utf8Error> for TelemetryError {
    fn from(e: std::str::Utf8Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}

/// Errors of the record data model: schema construction, row parsing and
/// field lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// A log row could not be decomposed into schema-aligned values.
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// A selected field is absent from the record's schema.
    #[error("missing field '{0}' in record")]
    MissingField(Field),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("schema: {0}")]
    Schema(String),
}
