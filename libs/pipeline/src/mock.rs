//! In-memory transport for unit tests: every accepted connection records
//! its frames and can be scripted to break after N writes.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use telemetry_api::{TelemetryError, Transport, TransportStream};

/// Frames written, tagged with the index of the connection that carried them.
pub(crate) type WireLog = Arc<Mutex<Vec<(usize, String)>>>;

pub(crate) struct MockTransport {
    /// Per upcoming connection: successful writes before it breaks.
    plans: VecDeque<Option<usize>>,
    accepted: usize,
    log: WireLog,
    pub(crate) fail_start: bool,
}

impl MockTransport {
    pub(crate) fn new(plans: impl IntoIterator<Item = Option<usize>>) -> (Self, WireLog) {
        let log = WireLog::default();
        let transport = Self {
            plans: plans.into_iter().collect(),
            accepted: 0,
            log: log.clone(),
            fail_start: false,
        };
        (transport, log)
    }
}

impl Transport for MockTransport {
    fn start(&mut self) -> Result<(), TelemetryError> {
        if self.fail_start {
            return Err(TelemetryError::config("bind mock: address in use"));
        }
        Ok(())
    }

    fn next_connection(&mut self) -> Result<Option<Box<dyn TransportStream>>, TelemetryError> {
        let Some(plan) = self.plans.pop_front() else {
            return Ok(None);
        };
        let stream = MockStream { id: self.accepted, budget: plan, log: self.log.clone() };
        self.accepted += 1;
        Ok(Some(Box::new(stream)))
    }

    fn stop(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn local_addr(&self) -> Option<String> {
        Some("mock:0".into())
    }
}

struct MockStream {
    id: usize,
    budget: Option<usize>,
    log: WireLog,
}

impl Read for MockStream {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(0)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            *budget -= 1;
        }
        let frame = String::from_utf8_lossy(buf).into_owned();
        self.log.lock().unwrap().push((self.id, frame));
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl TransportStream for MockStream {
    fn peer_info(&self) -> String {
        format!("mock#{}", self.id)
    }
}
