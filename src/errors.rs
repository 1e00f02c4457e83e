use thiserror::Error;

/// Error taxonomy of the sync client.
///
/// Nothing here is fatal to the host: transport errors drive the reconnect
/// loop, REST errors end up as a human-readable string in the store, and
/// `AuthExpired` tells the host to send the whole session back through the
/// external login flow.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("credential rejected; re-authentication required")]
    AuthExpired,

    #[error("no valid credential available")]
    MissingCredential,

    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Api(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// True when the host should redirect to re-authentication instead of
    /// surfacing a local error string.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}
