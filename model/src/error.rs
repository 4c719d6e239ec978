use thiserror::Error;

/// Everything that can go wrong setting up or running a route replay. Nothing here is retried;
/// replay is a visual aid, so callers just report the problem.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("need at least 2 footprints with valid coordinates to replay a route, but only have {0}")]
    InsufficientData(usize),
    #[error("invalid coordinate {0}")]
    InvalidCoordinate(String),
    #[error("a segment needs at least 1 sample")]
    InvalidSampleCount,
    #[error("frame rate must be at least 1 frame per second")]
    InvalidFrameRate,
    #[error("map surface failed: {0:#}")]
    RenderSurface(anyhow::Error),
}
