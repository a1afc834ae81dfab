use std::net::TcpStream;
use std::time::Duration;

use serde::Deserialize;
use telemetry_api::{TelemetryError, Transport, TransportStream};

/// Outbound single-connection transport.
pub struct TcpClientTransport {
    addr: String,
    read_timeout: Option<Duration>,
    connected: bool,
}

impl TcpClientTransport {
    pub fn new(addr: impl Into<String>, read_timeout: Option<Duration>) -> Self {
        Self { addr: addr.into(), read_timeout, connected: false }
    }

    pub fn from_config(cfg: &TcpClientConfig) -> Self {
        let read_timeout = (cfg.read_timeout_ms > 0).then(|| Duration::from_millis(cfg.read_timeout_ms));
        Self::new(format!("{}:{}", cfg.host, cfg.port), read_timeout)
    }
}

impl Transport for TcpClientTransport {
    fn start(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn next_connection(&mut self) -> Result<Option<Box<dyn TransportStream>>, TelemetryError> {
        if self.connected {
            // Single-connection transport: after connecting once, signal "no more".
            return Ok(None);
        }
        let stream = TcpStream::connect(&self.addr)
            .map_err(|e| TelemetryError::io(format!("TCP connect to {}: {e}", self.addr)))?;
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(|e| TelemetryError::config(format!("read timeout: {e}")))?;
        self.connected = true;
        tracing::info!(addr = %self.addr, "tcp-client connected");
        Ok(Some(Box::new(stream)))
    }

    fn stop(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn local_addr(&self) -> Option<String> {
        Some(self.addr.clone())
    }
}

// ---- Config ----

#[derive(Debug, Clone, Deserialize)]
pub struct TcpClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Receive timeout in milliseconds (0 = block forever).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_read_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use transport_tcp_server::TcpServerTransport;

    use super::*;

    #[test]
    fn connects_once_then_reports_shutdown() {
        let mut server = TcpServerTransport::new("127.0.0.1:0");
        server.start().unwrap();
        let addr = server.local_addr().unwrap();

        let accept = std::thread::spawn(move || {
            let mut conn = server.next_connection().unwrap().unwrap();
            conn.write_all(b"Time:0.0;@@").unwrap();
        });

        let mut client = TcpClientTransport::new(addr, Some(Duration::from_secs(5)));
        client.start().unwrap();
        let mut stream = client.next_connection().unwrap().unwrap();
        accept.join().unwrap();

        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "Time:0.0;@@");
        assert!(client.next_connection().unwrap().is_none());
    }

    #[test]
    fn refused_connection_is_io_error() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let mut client = TcpClientTransport::new(format!("127.0.0.1:{port}"), None);
        let err = client.next_connection().err().unwrap();
        assert_eq!(err.kind(), telemetry_api::ErrorKind::Io);
    }

    #[test]
    fn zero_timeout_means_blocking() {
        let cfg = TcpClientConfig { host: default_host(), port: 1, read_timeout_ms: 0 };
        assert_eq!(TcpClientTransport::from_config(&cfg).read_timeout, None);
    }
}
