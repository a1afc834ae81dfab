use std::sync::Arc;

use format_labeled::LabeledCodec;
use framing_delimited::DelimitedFraming;
use telemetry_api::{Codec, Framing, Message, Record, Selection};

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Endpoint
// ═══════════════════════════════════════════════════════════════

/// Wire encoding of one side of a replay: codec + framing.
#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    pub framing: Arc<dyn Framing>,
    pub codec: Arc<dyn Codec>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, framing: Arc<dyn Framing>, codec: Arc<dyn Codec>) -> Self {
        Self { name: name.into(), framing, codec }
    }

    /// Labeled payloads in `@@` frames. `None` sends whole records.
    pub fn labeled(name: impl Into<String>, selection: Option<Selection>, framing: DelimitedFraming) -> Self {
        let codec = match selection {
            Some(selection) => LabeledCodec::selected(selection),
            None => LabeledCodec::full(),
        };
        Self::new(name, Arc::new(framing), Arc::new(codec))
    }

    /// Encode: Record → wire bytes appended to `out`.
    ///
    /// Pipeline: codec.encode() → framing.encode()
    pub fn encode_to_wire(&self, record: &Record, out: &mut Vec<u8>) -> Result<(), PipelineError> {
        let payload = self.codec.encode(record)?;
        self.framing.encode(&payload, out)?;
        Ok(())
    }

    /// Framed end-of-stream marker appended to `out`.
    pub fn encode_end(&self, out: &mut Vec<u8>) -> Result<(), PipelineError> {
        self.framing.encode(&self.codec.encode_end(), out)?;
        Ok(())
    }

    /// Decode: one unframed payload → Message.
    pub fn decode_frame(&self, frame: &[u8]) -> Result<Message, PipelineError> {
        Ok(self.codec.decode(frame)?)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).finish_non_exhaustive()
    }
}
