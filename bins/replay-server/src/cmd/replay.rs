use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::time::Duration;

use format_csv::LogReader;
use framing_delimited::DelimitedFraming;
use replay_pipeline::{CancellationToken, ConnectionManager, Endpoint, ReplaySummary, Scheduler};
use telemetry_api::FieldSchema;
use transport_tcp_server::{TcpServerConfig, TcpServerTransport};

use super::config::Effective;
use super::error::ReplayServerError;

// ═══════════════════════════════════════════════════════════════
//  Replay
// ═══════════════════════════════════════════════════════════════

/// A bound, ready-to-run replay: the log is open and the port is held.
pub struct Replay {
    scheduler: Scheduler,
    reader: LogReader<BufReader<File>>,
    cancel: CancellationToken,
}

impl Replay {
    /// Open the log, validate the selection and bind the listener.
    pub fn prepare(eff: &Effective) -> Result<Self, ReplayServerError> {
        let schema = FieldSchema::openrocket();
        let selection = eff.config.selection(&schema)?;
        let reader = LogReader::open(&eff.log, schema, eff.config.reader.clone())?;
        let fields = selection.as_ref().map_or(reader.schema().fields(), |s| s.fields());
        tracing::info!(log = %eff.log.display(), config = ?eff.source, fields = fields.len(), "log opened");
        for field in fields {
            tracing::debug!(field = %field, unit = field.unit(), "sending field");
        }

        let transport = TcpServerTransport::from_config(&TcpServerConfig {
            port: eff.port,
            host: eff.config.host.clone(),
            nodelay: eff.config.connection.nodelay,
        });
        let connection = ConnectionManager::bind(Box::new(transport), eff.config.connection.accept_retry())?;

        let framing = DelimitedFraming::from_config(&eff.config.framing)?;
        let endpoint = Endpoint::labeled("replay", selection, framing);
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(endpoint, connection, eff.config.scheduler_options(), cancel.clone());

        Ok(Self { scheduler, reader, cancel })
    }

    pub fn local_addr(&self) -> Option<String> {
        self.scheduler.connection().local_addr()
    }

    /// Run the replay on a blocking thread until it ends or `shutdown`
    /// resolves. After `shutdown` the replay finishes its current wait and
    /// sends the end marker; a Ctrl+C at that point abandons it.
    ///
    /// A replay still waiting for a client when `shutdown` resolves is woken
    /// by a local connection to its own listener, so it returns without one.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<ReplaySummary, ReplayServerError> {
        let addr = self.local_addr();
        let Self { mut scheduler, reader, cancel } = self;
        let mut task = tokio::task::spawn_blocking(move || scheduler.run(reader));

        let joined = tokio::select! {
            r = &mut task => r,
            _ = shutdown => {
                tracing::info!("shutdown requested, stopping replay");
                cancel.cancel();
                if let Some(addr) = addr {
                    tokio::task::spawn_blocking(move || wake_listener(&addr));
                }
                tokio::select! {
                    r = &mut task => r,
                    _ = tokio::signal::ctrl_c() => return Err(ReplayServerError::Interrupted),
                }
            }
        };
        Ok(joined??)
    }
}

/// Unblock a pending accept on `addr`. The connection is dropped at once.
fn wake_listener(addr: &str) {
    let Ok(mut target) = addr.parse::<SocketAddr>() else {
        return;
    };
    if target.ip().is_unspecified() {
        let loopback = match target {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        target.set_ip(loopback);
    }
    if let Err(e) = TcpStream::connect_timeout(&target, Duration::from_secs(1)) {
        tracing::debug!(addr = %target, error = %e, "listener wake-up failed");
    }
}

/// Replay `eff.log` until it completes or Ctrl+C.
pub async fn run(eff: &Effective) -> Result<ReplaySummary, ReplayServerError> {
    let replay = Replay::prepare(eff)?;
    replay
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
