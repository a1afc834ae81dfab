//! End-to-end replays over loopback TCP.

use std::io::Write;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use format_csv::{LogReader, ReaderOptions};
use framing_delimited::DelimitedFraming;
use replay_pipeline::{
    CancellationToken, ConnectionManager, Endpoint, FrameReader, PipelineError, ReplayConfig, ReplaySummary,
    Scheduler, SchedulerOptions,
};
use telemetry_api::{Field, FieldSchema, Message, Selection, Transport, TransportStream};
use transport_tcp_client::TcpClientTransport;
use transport_tcp_server::TcpServerTransport;

fn telemetry_schema() -> FieldSchema {
    FieldSchema::new(Selection::TELEMETRY).unwrap()
}

fn write_log(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Bind on an ephemeral port and run the replay on its own thread.
fn spawn_replay(
    log: &tempfile::NamedTempFile,
    schema: FieldSchema,
    selection: Option<Selection>,
    cancel: CancellationToken,
) -> (String, JoinHandle<Result<ReplaySummary, PipelineError>>) {
    let connection = ConnectionManager::bind(
        Box::new(TcpServerTransport::new("127.0.0.1:0")),
        Duration::from_millis(10),
    )
    .unwrap();
    let addr = connection.local_addr().unwrap();
    let reader = LogReader::open(log.path(), schema, ReaderOptions::default()).unwrap();
    let endpoint = Endpoint::labeled("replay", selection, DelimitedFraming::default());
    let mut scheduler = Scheduler::new(endpoint, connection, SchedulerOptions::default(), cancel);
    let handle = std::thread::spawn(move || scheduler.run(reader));
    (addr, handle)
}

fn connect(addr: &str) -> FrameReader<Box<dyn TransportStream>> {
    let mut transport = TcpClientTransport::new(addr, Some(Duration::from_secs(5)));
    transport.start().unwrap();
    let stream = transport.next_connection().unwrap().unwrap();
    FrameReader::new(stream, Endpoint::labeled("client", None, DelimitedFraming::default()))
}

#[test]
fn two_rows_are_paced_then_end() {
    let log = write_log("# OpenRocket export\n0.0,0.01,0.001\n# event APOGEE\n0.5,0.01,0.002\n");
    let schema = telemetry_schema();
    let selection = Selection::telemetry(&schema).ok();
    let (addr, handle) = spawn_replay(&log, schema, selection, CancellationToken::new());

    let mut client = connect(&addr);
    let mut arrivals = Vec::new();
    for message in client.by_ref() {
        let message = message.unwrap();
        arrivals.push((Instant::now(), message));
    }

    assert_eq!(arrivals.len(), 3);
    let (t0, first) = &arrivals[0];
    let (t1, second) = &arrivals[1];
    assert_eq!(first.value(Field::Time), Some("0.0"));
    assert_eq!(first.value(Field::ComputationTime), Some("0.001"));
    assert_eq!(second.value(Field::Time), Some("0.5"));
    assert_eq!(arrivals[2].1, Message::End);

    let gap = t1.duration_since(*t0);
    assert!(gap >= Duration::from_millis(450), "records too close: {gap:?}");
    assert!(gap < Duration::from_millis(600), "records too far apart: {gap:?}");

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.dropped, 0);
    assert!(summary.end_delivered);
    assert!(summary.max_lateness < Duration::from_millis(50), "{summary:?}");
}

#[test]
fn exact_wire_bytes() {
    use std::io::Read;

    let log = write_log("0.0,0.01,0.001\n");
    let schema = telemetry_schema();
    let (addr, handle) = spawn_replay(&log, schema, None, CancellationToken::new());

    let mut stream = std::net::TcpStream::connect(&addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut received = String::new();
    stream.read_to_string(&mut received).unwrap();

    assert_eq!(received, "Time:0.0;Simulation time step:0.01;Computation time:0.001;@@END@@");
    handle.join().unwrap().unwrap();
}

#[test]
fn malformed_row_closes_without_end() {
    let log = write_log("0.0,0.01,0.001\n0.1,0.01\n0.2,0.01,0.001\n");
    let (addr, handle) = spawn_replay(&log, telemetry_schema(), None, CancellationToken::new());

    let mut client = connect(&addr);
    assert!(matches!(client.next(), Some(Ok(Message::Data(_)))));
    assert!(matches!(client.next(), Some(Err(PipelineError::UnexpectedEof))));

    let err = handle.join().unwrap().unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn cancellation_stops_long_replay() {
    let log = write_log("0.0,0.01,0.001\n60.0,0.01,0.001\n");
    let cancel = CancellationToken::new();
    let (addr, handle) = spawn_replay(&log, telemetry_schema(), None, cancel.clone());

    let mut client = connect(&addr);
    assert!(matches!(client.next(), Some(Ok(Message::Data(_)))));
    let started = Instant::now();
    cancel.cancel();
    assert!(matches!(client.next(), Some(Ok(Message::End))));
    assert!(started.elapsed() < Duration::from_secs(5));

    let summary = handle.join().unwrap().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.sent, 1);
}

#[test]
fn client_reconnects_mid_replay() {
    let rows: String = (0..40).map(|i| format!("{:.2},0.01,0.001\n", f64::from(i) * 0.02)).collect();
    let log = write_log(&rows);
    let (addr, handle) = spawn_replay(&log, telemetry_schema(), None, CancellationToken::new());

    // first client leaves after one message
    let mut first = connect(&addr);
    assert!(matches!(first.next(), Some(Ok(Message::Data(_)))));
    drop(first);

    let second = connect(&addr);
    let messages: Vec<Message> = second.map(Result::unwrap).collect();
    assert_eq!(messages.last(), Some(&Message::End));
    assert_eq!(messages.iter().filter(|m| **m == Message::End).count(), 1);

    // times on the new connection are strictly increasing: nothing replayed twice
    let times: Vec<f64> = messages
        .iter()
        .filter_map(|m| m.value(Field::Time))
        .map(|t| t.parse().unwrap())
        .collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.reconnects, 1);
    assert_eq!(summary.sent + summary.dropped, 40);
    assert!(summary.dropped >= 1);
}

#[test]
fn config_drives_selection() {
    let config = ReplayConfig::from_toml(r#"selection = ["Computation time"]"#).unwrap();
    let schema = telemetry_schema();
    let selection = config.selection(&schema).unwrap();
    let log = write_log("0.0,0.01,0.25\n");
    let (addr, handle) = spawn_replay(&log, schema, selection, CancellationToken::new());

    let messages: Vec<Message> = connect(&addr).map(Result::unwrap).collect();
    assert_eq!(
        messages,
        vec![Message::Data(vec![("Computation time".into(), "0.25".into())]), Message::End]
    );
    handle.join().unwrap().unwrap();
}
