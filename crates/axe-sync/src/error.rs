use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not establish historical stream: {0}")]
    Historical(String),
    #[error("connection to provider interrupted")]
    ProviderInterrupted,
}
