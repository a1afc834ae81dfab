use std::io::Read;

use telemetry_api::Message;

use crate::endpoint::Endpoint;
use crate::PipelineError;

/// Receive side of a replay: reassembles frames from a byte stream and
/// decodes them through the endpoint's codec.
///
/// The iterator ends after [`Message::End`]. A stream that closes before
/// the end marker yields [`PipelineError::UnexpectedEof`] once.
pub struct FrameReader<S> {
    stream: S,
    endpoint: Endpoint,
    buf: Vec<u8>,
    chunk: Box<[u8]>,
    finished: bool,
}

impl<S: Read> FrameReader<S> {
    pub fn new(stream: S, endpoint: Endpoint) -> Self {
        Self {
            stream,
            endpoint,
            buf: Vec::with_capacity(4096),
            chunk: vec![0u8; 4096].into_boxed_slice(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next decoded message, `Ok(None)` after the end marker.
    ///
    /// A payload that fails to decode is returned as an error and the reader
    /// continues with the following frame. Framing errors end the stream.
    pub fn next_message(&mut self) -> Result<Option<Message>, PipelineError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let decoded = self.endpoint.framing.decode(&self.buf).inspect_err(|_| self.finished = true)?;
            if let Some((frame, consumed)) = decoded {
                self.buf.drain(..consumed);
                let message = self.endpoint.decode_frame(&frame)?;
                if message == Message::End {
                    self.finished = true;
                }
                return Ok(Some(message));
            }

            let n = match self.stream.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(PipelineError::Wire(e.into()));
                }
            };
            if n == 0 {
                self.finished = true;
                if !self.buf.is_empty() {
                    tracing::debug!(bytes = self.buf.len(), "discarding partial frame at eof");
                }
                return Err(PipelineError::UnexpectedEof);
            }
            self.buf.extend_from_slice(&self.chunk[..n]);
        }
    }
}

impl<S: Read> Iterator for FrameReader<S> {
    type Item = Result<Message, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

impl<S: Read> std::iter::FusedIterator for FrameReader<S> {}
