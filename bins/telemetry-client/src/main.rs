//! Reference client: connects to a replay server and prints every
//! telemetry sample until the end marker.

use std::io::Write;

use clap::Parser;
use framing_delimited::{DelimitedFraming, FRAME_DELIMITER};
use replay_pipeline::{Endpoint, FrameReader, PipelineError};
use serde::Serialize;
use telemetry_api::{Field, Message, Transport, TransportStream};
use transport_tcp_client::{TcpClientConfig, TcpClientTransport};

/// Largest frame the client buffers before giving up on the stream.
const MAX_FRAME: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "telemetry-client", about = "Prints telemetry received from a replay server")]
struct Cli {
    /// Server port
    port: u16,

    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Receive timeout in seconds (0 = wait forever)
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// One JSON object per line instead of text blocks
    #[arg(long)]
    json: bool,
}

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error("could not contact server on port {0}")]
    Connect(u16),

    #[error("{0}")]
    Stream(#[from] PipelineError),

    #[error("stdout: {0}")]
    Output(#[from] std::io::Error),
}

impl ClientError {
    fn exit_code(&self) -> i32 {
        match self {
            ClientError::Connect(_) => 2,
            _ => 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sample
// ═══════════════════════════════════════════════════════════════

/// The three default telemetry fields, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct TelemetrySample {
    time: f64,
    sim_time_step: f64,
    comp_time: f64,
}

impl TelemetrySample {
    fn from_message(message: &Message) -> Result<Self, String> {
        let number = |field: Field| -> Result<f64, String> {
            let raw = message.value(field).ok_or_else(|| format!("missing '{field}'"))?;
            raw.trim().parse().map_err(|e| format!("'{field}' = {raw:?}: {e}"))
        };
        Ok(Self {
            time: number(Field::Time)?,
            sim_time_step: number(Field::SimulationTimeStep)?,
            comp_time: number(Field::ComputationTime)?,
        })
    }

    fn write_text(&self, raw: &str, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "-----\n>>>> \"{raw}\"")?;
        writeln!(
            out,
            "Time: {:.6},\nSimulation time step: {:.6},\nComputation time: {:.6}",
            self.time, self.sim_time_step, self.comp_time
        )
    }
}

/// Payload text of a data message, without the frame delimiter.
fn payload(message: &Message) -> String {
    match message {
        Message::Data(pairs) => pairs.iter().map(|(k, v)| format!("{k}:{v};")).collect(),
        Message::End => telemetry_api::END_MARKER.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Receive loop
// ═══════════════════════════════════════════════════════════════

fn connect(cli: &Cli) -> Result<Box<dyn TransportStream>, ClientError> {
    let mut transport = TcpClientTransport::from_config(&TcpClientConfig {
        host: cli.host.clone(),
        port: cli.port,
        read_timeout_ms: cli.timeout_secs.saturating_mul(1000),
    });
    transport.start().map_err(|_| ClientError::Connect(cli.port))?;
    match transport.next_connection() {
        Ok(Some(stream)) => Ok(stream),
        Ok(None) | Err(_) => Err(ClientError::Connect(cli.port)),
    }
}

fn client_endpoint() -> Result<Endpoint, PipelineError> {
    let framing = DelimitedFraming::new(FRAME_DELIMITER, MAX_FRAME)?;
    Ok(Endpoint::labeled("client", None, framing))
}

/// Print samples from `reader` until the end marker. Returns the number of
/// samples printed.
fn receive<S: std::io::Read>(
    reader: &mut FrameReader<S>,
    json: bool,
    out: &mut impl Write,
) -> Result<u64, ClientError> {
    let mut printed = 0;
    loop {
        let message = match reader.next_message() {
            Ok(Some(Message::End)) | Ok(None) => break,
            Ok(Some(message)) => message,
            Err(e) if e.is_bad_frame() && !reader.is_finished() => {
                eprintln!("skipping frame: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let sample = match TelemetrySample::from_message(&message) {
            Ok(s) => s,
            Err(reason) => {
                eprintln!("skipping frame {:?}: {reason}", payload(&message));
                continue;
            }
        };
        if json {
            serde_json::to_writer(&mut *out, &sample).map_err(std::io::Error::from)?;
            writeln!(out)?;
        } else {
            sample.write_text(&payload(&message), out)?;
        }
        out.flush()?;
        printed += 1;
    }
    Ok(printed)
}

fn run(cli: &Cli) -> Result<u64, ClientError> {
    let stream = connect(cli)?;
    tracing::debug!(peer = %stream.peer_info(), "connected");
    let mut reader = FrameReader::new(stream, client_endpoint()?);
    let mut out = std::io::stdout().lock();
    receive(&mut reader, cli.json, &mut out)
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(samples) => tracing::info!(samples, "end of replay"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
