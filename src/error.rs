use thiserror::Error;

/// Errors surfaced by session I/O and gateway setup.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote side closed the connection. Reads past this point have
    /// nothing left to return; writes have nowhere to go.
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl GatewayError {
    /// True when the error means the peer is gone rather than a transient
    /// transport fault.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, GatewayError::PeerClosed)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
