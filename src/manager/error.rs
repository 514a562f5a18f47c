//! Error taxonomy of the transfer engine.

/// Terminal error reported by [`TransferManager`](crate::TransferManager),
/// either synchronously from `start_download`/`start_upload` or through the
/// `failed` callback.
///
/// Success is `Ok(())`; there is no "no error" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// Bug or transport malfunction; check the logs when this surfaces.
    #[error("internal error, see logs for details")]
    Internal,

    /// The remote rejected the configured credentials.
    #[error("login credentials were rejected")]
    InvalidLogin,

    /// Batch validation failed or the transport rejected a URL.
    #[error("invalid request")]
    InvalidRequest,

    /// TLS/SSL negotiation failed.
    #[error("TLS negotiation failed")]
    InvalidSsl,

    /// A batch is already running; the new one was refused.
    #[error("a transfer batch is already in progress")]
    Busy,

    /// The caller aborted the running batch.
    #[error("transfer aborted by caller")]
    UserAbort,

    /// A request exhausted its retry budget.
    #[error("maximum number of trials reached")]
    MaxTrials,

    /// Local storage or memory full while receiving. Reserved: carried in
    /// the taxonomy for callers, never raised by the engine today.
    #[error("local storage full")]
    MemoryFullHost,

    /// The remote reported out of space during an upload.
    #[error("remote storage full")]
    MemoryFullRemote,

    /// Host name lookup failed for every allowed trial.
    #[error("host not found")]
    HostNotFound,

    /// The host refused the connection for every allowed trial.
    #[error("host refused connection")]
    HostRefused,

    /// The remote resource does not exist.
    #[error("remote content not found")]
    ContentNotFound,
}

impl TransferError {
    /// Stable identifier-style name of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferError::Internal => "INTERNAL",
            TransferError::InvalidLogin => "INVALID_LOGIN",
            TransferError::InvalidRequest => "INVALID_REQUEST",
            TransferError::InvalidSsl => "INVALID_SSL",
            TransferError::Busy => "BUSY",
            TransferError::UserAbort => "USER_ABORT",
            TransferError::MaxTrials => "MAX_TRIALS",
            TransferError::MemoryFullHost => "MEMORY_FULL_HOST",
            TransferError::MemoryFullRemote => "MEMORY_FULL_REMOTE",
            TransferError::HostNotFound => "HOST_NOT_FOUND",
            TransferError::HostRefused => "HOST_REFUSED",
            TransferError::ContentNotFound => "CONTENT_NOT_FOUND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_names() {
        assert_eq!(TransferError::Busy.as_str(), "BUSY");
        assert_eq!(TransferError::MaxTrials.as_str(), "MAX_TRIALS");
        assert_eq!(TransferError::MemoryFullRemote.as_str(), "MEMORY_FULL_REMOTE");
    }

    #[test]
    fn test_display_is_human_readable() {
        assert_eq!(
            TransferError::Busy.to_string(),
            "a transfer batch is already in progress"
        );
        assert!(TransferError::Internal.to_string().contains("internal"));
    }
}
