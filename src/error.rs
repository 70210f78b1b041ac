use thiserror::Error;

/// Gateway-level error taxonomy. Every variant maps to a numeric wire code
/// carried by an `error` event back to the originating connection; errors
/// never drop the connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected client input (empty message, bad reply target, ...).
    #[error("{0}")]
    Validation(String),

    /// A referenced conversation/message/user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The event does not match the current protocol or call state.
    #[error("{0}")]
    Protocol(String),

    /// Durable store failure. Not retried; partial side effects stand.
    #[error("store error: {0}")]
    Store(String),
}

impl GatewayError {
    pub fn code(&self) -> u32 {
        match self {
            GatewayError::Validation(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::Protocol(_) => 409,
            GatewayError::Store(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        GatewayError::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        GatewayError::Store(format!("blocking task failed: {err}"))
    }
}
