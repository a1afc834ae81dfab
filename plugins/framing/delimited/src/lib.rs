use serde::Deserialize;
use telemetry_api::{Framing, TelemetryError};

/// Frame terminator of the replay protocol.
pub const FRAME_DELIMITER: &[u8] = b"@@";

/// Frames terminated by a fixed byte sequence (`@@` by default).
#[derive(Debug, Clone)]
pub struct DelimitedFraming {
    delimiter: Vec<u8>,
    max_length: usize,
}

impl DelimitedFraming {
    pub fn new(delimiter: impl Into<Vec<u8>>, max_length: usize) -> Result<Self, TelemetryError> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(TelemetryError::config("frame delimiter must not be empty"));
        }
        Ok(Self { delimiter, max_length })
    }

    pub fn from_config(cfg: &DelimitedConfig) -> Result<Self, TelemetryError> {
        Self::new(cfg.delimiter.as_bytes(), cfg.max_length)
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }
}

impl Default for DelimitedFraming {
    fn default() -> Self {
        Self { delimiter: FRAME_DELIMITER.to_vec(), max_length: 0 }
    }
}

impl Framing for DelimitedFraming {
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, TelemetryError> {
        let pos = match buf.windows(self.delimiter.len()).position(|w| w == self.delimiter) {
            Some(p) => p,
            None => {
                // No complete frame yet, check max_length
                if self.max_length > 0 && buf.len() > self.max_length {
                    return Err(TelemetryError::format_err(format!(
                        "frame too long: {} bytes (max {}) and no delimiter found",
                        buf.len(),
                        self.max_length
                    )));
                }
                return Ok(None);
            }
        };

        if self.max_length > 0 && pos > self.max_length {
            return Err(TelemetryError::format_err(format!(
                "frame too long: {pos} bytes (max {})",
                self.max_length
            )));
        }

        Ok(Some((buf[..pos].to_vec(), pos + self.delimiter.len())))
    }

    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), TelemetryError> {
        buf.extend_from_slice(data);
        buf.extend_from_slice(&self.delimiter);
        Ok(())
    }
}

// ---- Config ----

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelimitedConfig {
    /// Frame terminator.
    pub delimiter: String,
    /// Maximum frame length in bytes (0 = unlimited).
    pub max_length: usize,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: String::from_utf8_lossy(FRAME_DELIMITER).into_owned(),
            max_length: 0,
        }
    }
}
