use std::time::Duration;

use telemetry_api::{Record, RecordError};
use tokio_util::sync::CancellationToken;

use crate::clock::{Pacer, ReplayClock};
use crate::connection::{ConnectionManager, ConnectionState, SendOutcome};
use crate::endpoint::Endpoint;
use crate::PipelineError;

/// Counters of one finished replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Data frames written to a client.
    pub sent: u64,
    /// Data frames lost to a broken connection.
    pub dropped: u64,
    pub reconnects: u64,
    /// Records emitted later than `slack` after their due time.
    pub late: u64,
    pub max_lateness: Duration,
    pub end_delivered: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub pacer: Pacer,
    /// Lateness above this is counted and logged.
    pub slack: Duration,
    /// Log progress every N records (0 = never).
    pub progress_every: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            pacer: Pacer::default(),
            slack: Duration::from_millis(50),
            progress_every: 100,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Releases records at their recorded simulation time, one by one, in
/// source order, over the managed connection.
pub struct Scheduler {
    endpoint: Endpoint,
    connection: ConnectionManager,
    options: SchedulerOptions,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        endpoint: Endpoint,
        connection: ConnectionManager,
        options: SchedulerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self { endpoint, connection, options, cancel }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Replay `records` and send the end marker.
    ///
    /// Waits for the first client before starting the replay clock. A
    /// malformed record aborts the replay without an end marker. The
    /// connection is closed on return either way.
    pub fn run<I>(&mut self, records: I) -> Result<ReplaySummary, PipelineError>
    where
        I: IntoIterator<Item = Result<Record, RecordError>>,
    {
        let result = self.replay(records.into_iter());
        self.connection.close();
        result
    }

    fn replay<I>(&mut self, records: I) -> Result<ReplaySummary, PipelineError>
    where
        I: Iterator<Item = Result<Record, RecordError>>,
    {
        if self.connection.state() != ConnectionState::Accepted {
            tracing::info!(
                endpoint = %self.endpoint.name,
                addr = self.connection.local_addr().as_deref().unwrap_or("?"),
                "waiting for client to connect"
            );
            self.connection.accept()?;
        }

        let clock = ReplayClock::start();
        let mut summary = ReplaySummary::default();
        let mut buf = Vec::with_capacity(1024);
        tracing::info!(endpoint = %self.endpoint.name, wait = %self.options.pacer.strategy(), "replay started");

        for item in records {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let record = item?;

            let due = record.offset();
            if !self.options.pacer.wait_until(&clock, due, &self.cancel) {
                summary.cancelled = true;
                break;
            }

            buf.clear();
            self.endpoint.encode_to_wire(&record, &mut buf)?;

            let lateness = clock.elapsed().saturating_sub(due);
            if lateness > self.options.slack {
                summary.late += 1;
                tracing::debug!(time = record.time(), lateness_ms = lateness.as_millis() as u64, "late record");
            }
            summary.max_lateness = summary.max_lateness.max(lateness);

            match self.connection.send(&buf)? {
                SendOutcome::Delivered => summary.sent += 1,
                SendOutcome::Dropped => {
                    summary.dropped += 1;
                    tracing::info!(time = record.time(), peer = %self.connection.peer(), "record dropped, replay continues");
                }
            }

            let total = summary.sent + summary.dropped;
            if self.options.progress_every > 0 && total % self.options.progress_every == 0 {
                tracing::info!(
                    records = total,
                    sim_time = record.time(),
                    elapsed_s = format_args!("{:.1}", clock.elapsed().as_secs_f64()),
                    "replay progress"
                );
            }
        }

        if summary.cancelled {
            tracing::info!("replay cancelled");
        }

        buf.clear();
        self.endpoint.encode_end(&mut buf)?;
        summary.end_delivered = self.connection.send_final(&buf);
        if !summary.end_delivered {
            tracing::warn!("end marker not delivered");
        }
        summary.reconnects = self.connection.reconnects();

        tracing::info!(
            sent = summary.sent,
            dropped = summary.dropped,
            reconnects = summary.reconnects,
            late = summary.late,
            max_lateness_ms = summary.max_lateness.as_millis() as u64,
            elapsed_s = format_args!("{:.1}", clock.elapsed().as_secs_f64()),
            "replay complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use framing_delimited::DelimitedFraming;
    use telemetry_api::{Field, FieldSchema, Selection};

    use super::*;
    use crate::clock::WaitStrategy;
    use crate::mock::{MockTransport, WireLog};

    fn schema() -> FieldSchema {
        FieldSchema::new([Field::Time, Field::SimulationTimeStep, Field::ComputationTime]).unwrap()
    }

    fn records(times: &[&str]) -> Vec<Result<Record, RecordError>> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| Record::from_row(&schema(), i + 1, vec![t.to_string(), "0.01".into(), "0.001".into()]))
            .collect()
    }

    fn scheduler(plans: Vec<Option<usize>>) -> (Scheduler, WireLog) {
        let (transport, log) = MockTransport::new(plans);
        let connection = ConnectionManager::bind(Box::new(transport), Duration::from_millis(1)).unwrap();
        let selection = Selection::new([Field::Time], &schema()).unwrap();
        let endpoint = Endpoint::labeled("test", Some(selection), DelimitedFraming::default());
        let options = SchedulerOptions {
            pacer: Pacer::new(WaitStrategy::Sleep, Duration::from_millis(1)),
            ..SchedulerOptions::default()
        };
        (Scheduler::new(endpoint, connection, options, CancellationToken::new()), log)
    }

    fn wire(log: &WireLog) -> Vec<(usize, String)> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn sends_records_in_order_then_end() {
        let (mut s, log) = scheduler(vec![None]);
        let summary = s.run(records(&["0.0", "0.01", "0.02"])).unwrap();

        assert_eq!(summary.sent, 3);
        assert!(summary.end_delivered);
        assert_eq!(
            wire(&log),
            vec![
                (0, "Time:0.0;@@".to_string()),
                (0, "Time:0.01;@@".to_string()),
                (0, "Time:0.02;@@".to_string()),
                (0, "END@@".to_string()),
            ]
        );
        assert_eq!(s.connection().state(), ConnectionState::Closed);
    }

    #[test]
    fn broken_record_is_dropped_and_replay_continues() {
        // connection 0 breaks on its 2nd write (record k = 0.01)
        let (mut s, log) = scheduler(vec![Some(1), None]);
        let summary = s.run(records(&["0.0", "0.01", "0.02", "0.03"])).unwrap();

        assert_eq!(summary.sent, 3);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.reconnects, 1);
        assert_eq!(
            wire(&log),
            vec![
                (0, "Time:0.0;@@".to_string()),
                (1, "Time:0.02;@@".to_string()),
                (1, "Time:0.03;@@".to_string()),
                (1, "END@@".to_string()),
            ]
        );
    }

    #[test]
    fn end_is_sent_once_after_several_reconnects() {
        let (mut s, log) = scheduler(vec![Some(0), Some(1), None]);
        let summary = s.run(records(&["0.0", "0.0", "0.0", "0.0"])).unwrap();

        assert_eq!(summary.reconnects, 2);
        let log = wire(&log);
        let ends: Vec<_> = log.iter().filter(|(_, f)| f == "END@@").collect();
        assert_eq!(ends.len(), 1);
        assert_eq!(log.last().map(|(c, f)| (*c, f.as_str())), Some((2, "END@@")));
    }

    #[test]
    fn malformed_record_aborts_without_end() {
        let (mut s, log) = scheduler(vec![None]);
        let mut input = records(&["0.0"]);
        input.push(Err(RecordError::Malformed { line: 2, reason: "expected 3 values, got 1".into() }));
        input.extend(records(&["0.1"]));

        let err = s.run(input).unwrap_err();
        assert!(matches!(err, PipelineError::Record(RecordError::Malformed { line: 2, .. })));
        assert_eq!(wire(&log), vec![(0, "Time:0.0;@@".to_string())]);
        assert_eq!(s.connection().state(), ConnectionState::Closed);
    }

    #[test]
    fn cancelled_replay_still_sends_end() {
        let (mut s, log) = scheduler(vec![None]);
        s.cancel.cancel();
        let summary = s.run(records(&["0.0", "10.0"])).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.sent, 0);
        assert_eq!(wire(&log), vec![(0, "END@@".to_string())]);
    }

    #[test]
    fn late_records_are_sent_not_skipped() {
        let (mut s, log) = scheduler(vec![None]);
        // out-of-order time: second record is already due
        let summary = s.run(records(&["0.06", "0.0"])).unwrap();
        assert_eq!(summary.sent, 2);
        assert!(summary.late >= 1);
        assert!(summary.max_lateness >= Duration::from_millis(50));
        assert_eq!(wire(&log).len(), 3);
    }

    #[test]
    fn records_are_never_early() {
        let (mut s, _log) = scheduler(vec![None]);
        let started = std::time::Instant::now();
        s.run(records(&["0.0", "0.05", "0.1"])).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
