use std::time::Duration;

use crate::error::RecordError;
use crate::schema::{Field, FieldSchema};

/// One log row: a value per schema field plus the parsed simulation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: FieldSchema,
    values: Vec<String>,
    /// Seconds since replay start. Finite and non-negative.
    time: f64,
    offset: Duration,
}

impl Record {
    /// Bind `values` positionally to `schema`.
    ///
    /// `line` is the 1-based source line, used only for error reporting.
    pub fn from_row(schema: &FieldSchema, line: usize, values: Vec<String>) -> Result<Self, RecordError> {
        if values.len() != schema.len() {
            return Err(RecordError::Malformed {
                line,
                reason: format!("expected {} values, got {}", schema.len(), values.len()),
            });
        }

        let raw = values[schema.time_position()].trim();
        let time: f64 = raw.parse().map_err(|_| RecordError::Malformed {
            line,
            reason: format!("'{}' is not a number: {raw:?}", Field::Time),
        })?;
        if !time.is_finite() || time < 0.0 {
            return Err(RecordError::Malformed {
                line,
                reason: format!("'{}' must be a non-negative finite number, got {raw}", Field::Time),
            });
        }
        let offset = Duration::try_from_secs_f64(time).map_err(|_| RecordError::Malformed {
            line,
            reason: format!("'{}' is out of range: {raw}", Field::Time),
        })?;

        Ok(Self { schema: schema.clone(), values, time, offset })
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Recorded simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Offset from replay start at which this record is due.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.schema.position(field).map(|pos| self.values[pos].as_str())
    }

    /// Like [`Record::get`], but a missing field is an error.
    pub fn require(&self, field: Field) -> Result<&str, RecordError> {
        self.get(field).ok_or(RecordError::MissingField(field))
    }

    /// `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.schema
            .fields()
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }
}
