use thiserror::Error;

/// Errors raised inside the window engine.
///
/// None of these cross into the renderer. `FetchFailed` arms a single
/// automatic retry, `NotFound` and `InvariantViolation` are logged and the
/// offending operation is skipped so the window stays usable.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("history fetch failed: {0}")]
    FetchFailed(#[from] anyhow::Error),

    #[error("message {0} not found")]
    NotFound(i64),

    #[error("window invariant violated: {0}")]
    InvariantViolation(String),
}
