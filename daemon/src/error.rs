use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no API key configured")]
    NoCredential,

    #[error("completion provider unavailable: {0}")]
    UpstreamUnavailable(String),
}
