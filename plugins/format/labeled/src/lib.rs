//! `label:value;` payload format.
//!
//! A payload is the concatenation of `label:value;` segments with no other
//! separator. Values are not escaped; they must not contain `;` or the
//! frame delimiter.

use telemetry_api::{Codec, END_MARKER, Message, Record, RecordError, Selection, TelemetryError};

const PAIR_SEP: char = ':';
const FIELD_TERM: char = ';';

// ═══════════════════════════════════════════════════════════════
//  Encoding
// ═══════════════════════════════════════════════════════════════

/// Every field of the record, in schema order.
pub fn encode_full(record: &Record) -> String {
    let mut out = String::new();
    for (field, value) in record.iter() {
        push_pair(&mut out, field.label(), value);
    }
    out
}

/// Only the selected fields, in selection order.
pub fn encode_selected(record: &Record, selection: &Selection) -> Result<String, RecordError> {
    let mut out = String::new();
    for &field in selection.fields() {
        push_pair(&mut out, field.label(), record.require(field)?);
    }
    Ok(out)
}

fn push_pair(out: &mut String, label: &str, value: &str) {
    out.push_str(label);
    out.push(PAIR_SEP);
    out.push_str(value);
    out.push(FIELD_TERM);
}

// ═══════════════════════════════════════════════════════════════
//  Decoding
// ═══════════════════════════════════════════════════════════════

/// Parse one unframed payload.
///
/// `END` is the end-of-stream marker. Otherwise every `;`-terminated
/// segment splits on its first `:`. A trailing segment without `;` is
/// accepted, a segment without `:` is a format error.
pub fn decode(payload: &str) -> Result<Message, TelemetryError> {
    if payload == END_MARKER {
        return Ok(Message::End);
    }

    let mut pairs = Vec::new();
    for segment in payload.split(FIELD_TERM).filter(|s| !s.is_empty()) {
        let (label, value) = segment.split_once(PAIR_SEP).ok_or_else(|| {
            TelemetryError::format_err(format!("segment without '{PAIR_SEP}': {segment:?}"))
        })?;
        pairs.push((label.to_string(), value.to_string()));
    }

    if pairs.is_empty() {
        return Err(TelemetryError::format_err("empty payload"));
    }
    Ok(Message::Data(pairs))
}

// ═══════════════════════════════════════════════════════════════
//  LabeledCodec
// ═══════════════════════════════════════════════════════════════

/// [`Codec`] over the labeled format, sending either whole records or a
/// fixed selection.
#[derive(Debug, Clone)]
pub struct LabeledCodec {
    selection: Option<Selection>,
}

impl LabeledCodec {
    pub fn full() -> Self {
        Self { selection: None }
    }

    pub fn selected(selection: Selection) -> Self {
        Self { selection: Some(selection) }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }
}

impl Codec for LabeledCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, RecordError> {
        let payload = match &self.selection {
            Some(selection) => encode_selected(record, selection)?,
            None => encode_full(record),
        };
        Ok(payload.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Message, TelemetryError> {
        decode(std::str::from_utf8(data)?)
    }
}
