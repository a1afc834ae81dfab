use replay_pipeline::PipelineError;
use telemetry_api::TelemetryError;

#[derive(Debug, thiserror::Error)]
pub enum ReplayServerError {
    #[error("{0}")]
    Telemetry(#[from] TelemetryError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("replay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("interrupted before the replay could stop")]
    Interrupted,
}
