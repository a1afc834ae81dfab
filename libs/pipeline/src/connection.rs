use std::io::Write;
use std::time::Duration;

use telemetry_api::{ErrorKind, TelemetryError, Transport, TransportStream};

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Connection state
// ═══════════════════════════════════════════════════════════════

/// `Listening → Accepted → (Broken → Accepted)* → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Listening,
    Accepted,
    Broken,
    Closed,
}

/// Result of [`ConnectionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The connection broke; the frame was dropped and a new client has
    /// been accepted since.
    Dropped,
}

// ═══════════════════════════════════════════════════════════════
//  Connection manager
// ═══════════════════════════════════════════════════════════════

/// Owns the listening transport and at most one client connection.
///
/// Frames are never buffered across a broken connection: a failed frame is
/// dropped and the manager blocks until the next client connects.
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    stream: Option<Box<dyn TransportStream>>,
    peer: String,
    state: ConnectionState,
    accept_retry: Duration,
    reconnects: u64,
}

impl ConnectionManager {
    /// Start the transport. A failure here is fatal.
    pub fn bind(mut transport: Box<dyn Transport>, accept_retry: Duration) -> Result<Self, PipelineError> {
        if let Err(source) = transport.start() {
            let addr = transport.local_addr().unwrap_or_else(|| "?".into());
            return Err(PipelineError::Bind { addr, source });
        }
        Ok(Self {
            transport,
            stream: None,
            peer: String::new(),
            state: ConnectionState::Listening,
            accept_retry,
            reconnects: 0,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn local_addr(&self) -> Option<String> {
        self.transport.local_addr()
    }

    /// Peer of the active connection, empty before the first accept.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Number of times a broken connection was replaced.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Block until a client connects.
    ///
    /// Cancellation is not observed here; only a connection or a transport
    /// failure returns. Transient accept errors are retried after the
    /// back-off; a transport that shuts down or fails permanently ends the
    /// manager.
    pub fn accept(&mut self) -> Result<(), PipelineError> {
        loop {
            match self.transport.next_connection() {
                Ok(Some(stream)) => {
                    self.peer = stream.peer_info();
                    self.stream = Some(stream);
                    self.state = ConnectionState::Accepted;
                    tracing::info!(peer = %self.peer, "client connected");
                    return Ok(());
                }
                Ok(None) => {
                    self.state = ConnectionState::Closed;
                    return Err(PipelineError::TransportClosed);
                }
                Err(e) if e.kind() == ErrorKind::Io => {
                    tracing::error!(error = ?e, "accept error, retrying");
                    std::thread::sleep(self.accept_retry);
                }
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    return Err(PipelineError::Accept(e));
                }
            }
        }
    }

    /// Send one frame.
    ///
    /// On failure the broken connection is closed, the frame is dropped and
    /// the call blocks until a new client connects. Only accept failures
    /// are returned as errors.
    pub fn send(&mut self, frame: &[u8]) -> Result<SendOutcome, PipelineError> {
        match self.write(frame) {
            Ok(()) => Ok(SendOutcome::Delivered),
            Err(e) => {
                self.mark_broken(&e);
                tracing::warn!("lost connection, waiting for client to reconnect");
                self.accept()?;
                self.reconnects += 1;
                Ok(SendOutcome::Dropped)
            }
        }
    }

    /// Single best-effort attempt, no reconnect. Returns whether the frame
    /// was written.
    pub fn send_final(&mut self, frame: &[u8]) -> bool {
        match self.write(frame) {
            Ok(()) => true,
            Err(e) => {
                self.mark_broken(&e);
                false
            }
        }
    }

    /// Drop the connection and stop the transport.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.stream = None;
        if let Err(e) = self.transport.stop() {
            tracing::warn!(error = ?e, "transport stop error");
        }
        self.state = ConnectionState::Closed;
        tracing::debug!("connection manager closed");
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), TelemetryError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TelemetryError::io("no active connection"))?;
        stream.write_all(frame)?;
        stream.flush()?;
        Ok(())
    }

    fn mark_broken(&mut self, error: &TelemetryError) {
        tracing::warn!(peer = %self.peer, error = %error, "send failed");
        self.stream = None;
        self.state = ConnectionState::Broken;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    const RETRY: Duration = Duration::from_millis(1);

    fn frames(log: &crate::mock::WireLog) -> Vec<(usize, String)> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn bind_failure_is_fatal() {
        let (mut transport, _) = MockTransport::new([]);
        transport.fail_start = true;
        let err = ConnectionManager::bind(Box::new(transport), RETRY).err().unwrap();
        assert!(matches!(err, PipelineError::Bind { ref addr, .. } if addr == "mock:0"));
    }

    #[test]
    fn walks_the_state_machine() {
        let (transport, log) = MockTransport::new([Some(1), None]);
        let mut cm = ConnectionManager::bind(Box::new(transport), RETRY).unwrap();
        assert_eq!(cm.state(), ConnectionState::Listening);

        cm.accept().unwrap();
        assert_eq!(cm.state(), ConnectionState::Accepted);
        assert_eq!(cm.peer(), "mock#0");

        assert_eq!(cm.send(b"a@@").unwrap(), SendOutcome::Delivered);
        // second write breaks connection 0; manager re-accepts connection 1
        assert_eq!(cm.send(b"b@@").unwrap(), SendOutcome::Dropped);
        assert_eq!(cm.state(), ConnectionState::Accepted);
        assert_eq!(cm.peer(), "mock#1");
        assert_eq!(cm.reconnects(), 1);

        assert_eq!(cm.send(b"c@@").unwrap(), SendOutcome::Delivered);
        cm.close();
        assert_eq!(cm.state(), ConnectionState::Closed);

        assert_eq!(frames(&log), vec![(0, "a@@".to_string()), (1, "c@@".to_string())]);
    }

    #[test]
    fn final_send_is_not_retried() {
        let (transport, log) = MockTransport::new([Some(0), None]);
        let mut cm = ConnectionManager::bind(Box::new(transport), RETRY).unwrap();
        cm.accept().unwrap();

        assert!(!cm.send_final(b"END@@"));
        assert_eq!(cm.state(), ConnectionState::Broken);
        assert_eq!(cm.reconnects(), 0);
        assert!(frames(&log).is_empty());
    }

    #[test]
    fn exhausted_transport_ends_reconnect() {
        let (transport, _) = MockTransport::new([Some(0)]);
        let mut cm = ConnectionManager::bind(Box::new(transport), RETRY).unwrap();
        cm.accept().unwrap();

        assert!(matches!(cm.send(b"x@@"), Err(PipelineError::TransportClosed)));
        assert_eq!(cm.state(), ConnectionState::Closed);
    }

    #[test]
    fn send_without_client_waits_for_one() {
        let (transport, log) = MockTransport::new([None]);
        let mut cm = ConnectionManager::bind(Box::new(transport), RETRY).unwrap();
        assert_eq!(cm.send(b"lost@@").unwrap(), SendOutcome::Dropped);
        assert_eq!(cm.send(b"kept@@").unwrap(), SendOutcome::Delivered);
        assert_eq!(frames(&log), vec![(0, "kept@@".to_string())]);
    }
}
