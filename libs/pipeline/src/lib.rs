//! Paced replay of flight-log records to a single TCP client.
//!
//! [`Scheduler`] reads records, waits for each record's simulation time on
//! a [`ReplayClock`], encodes it through an [`Endpoint`] and hands the frame
//! to the [`ConnectionManager`]. [`FrameReader`] is the receiving side.

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
mod endpoint;
mod receiver;
mod scheduler;

#[cfg(test)]
mod mock;

pub use clock::{Pacer, ReplayClock, WaitStrategy};
pub use config::ReplayConfig;
pub use connection::{ConnectionManager, ConnectionState, SendOutcome};
pub use endpoint::Endpoint;
pub use error::PipelineError;
pub use receiver::FrameReader;
pub use scheduler::{ReplaySummary, Scheduler, SchedulerOptions};

pub use tokio_util::sync::CancellationToken;
