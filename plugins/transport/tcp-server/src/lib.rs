use std::net::TcpListener;

use serde::Deserialize;
use telemetry_api::{TelemetryError, Transport, TransportStream};

/// Listening endpoint that yields one accepted client per
/// [`Transport::next_connection`] call.
pub struct TcpServerTransport {
    addr: String,
    nodelay: bool,
    listener: Option<TcpListener>,
}

impl TcpServerTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), nodelay: true, listener: None }
    }

    pub fn from_config(cfg: &TcpServerConfig) -> Self {
        Self {
            addr: format!("{}:{}", cfg.host, cfg.port),
            nodelay: cfg.nodelay,
            listener: None,
        }
    }
}

impl Transport for TcpServerTransport {
    fn start(&mut self) -> Result<(), TelemetryError> {
        let listener = TcpListener::bind(&self.addr)
            .map_err(|e| TelemetryError::config(format!("bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "tcp-server listening");
        self.listener = Some(listener);
        Ok(())
    }

    fn next_connection(&mut self) -> Result<Option<Box<dyn TransportStream>>, TelemetryError> {
        let listener = self.listener.as_ref().ok_or_else(|| TelemetryError::logic("transport not started"))?;
        match listener.accept() {
            Ok((stream, addr)) => {
                if self.nodelay {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::warn!(peer = %addr, error = %e, "cannot set TCP_NODELAY");
                    }
                }
                tracing::info!(peer = %addr, "tcp-server client connected");
                Ok(Some(Box::new(stream)))
            }
            Err(e) => Err(TelemetryError::io(format!("accept error: {e}"))),
        }
    }

    fn stop(&mut self) -> Result<(), TelemetryError> {
        self.listener = None;
        Ok(())
    }

    fn local_addr(&self) -> Option<String> {
        match &self.listener {
            Some(l) => l.local_addr().ok().map(|a| a.to_string()),
            None => Some(self.addr.clone()),
        }
    }
}

// ---- Config ----

#[derive(Debug, Clone, Deserialize)]
pub struct TcpServerConfig {
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_nodelay() -> bool {
    true
}
