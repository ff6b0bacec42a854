use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid pattern {id}: {reason}")]
    InvalidPattern { id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
