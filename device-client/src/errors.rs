//! Typed domain errors; `anyhow` is reserved for the `main` boundary.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser unavailable: {0}")]
    Unavailable(String),
}
