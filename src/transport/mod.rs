//! Transport seam between the engine and the wire.
//!
//! The engine never talks to a protocol library directly: it describes each
//! transfer as a [`TransferPlan`], hands it to a [`Transport`] together with
//! the shared request, and consumes [`TransferOutcome`]s from the
//! transport's completion queue. This keeps the batch state machine
//! testable against a scripted in-memory transport while the production
//! driver ([`CurlTransport`]) runs libcurl's multi interface.

mod curl;
mod handler;

pub use self::curl::CurlTransport;

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::net::{Direction, SharedRequest};

/// Login credentials forwarded to FTP/FTPS transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything the transport needs to configure one transfer.
///
/// Built by the engine from the request and a snapshot of the engine
/// configuration; rebuilt from a fresh snapshot on every retry.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Formatted target URL.
    pub url: String,
    pub direction: Direction,
    /// Set for FTP/FTPS targets only.
    pub credentials: Option<Credentials>,
    /// Bound on the connection phase; zero disables the bound.
    pub connect_timeout: Duration,
    /// Minimum acceptable transfer rate in bytes per second.
    pub low_speed_limit: u32,
    /// How long the rate may stay below the limit before the transfer is
    /// failed; zero disables the watchdog.
    pub low_speed_time: Duration,
    /// Declared input size for uploads, zero for downloads.
    pub upload_size: u64,
    /// Create missing remote directories on FTP uploads.
    pub create_missing_dirs: bool,
}

/// Stable classification of a single failed transfer.
///
/// The engine maps these onto its public error taxonomy and decides retry
/// vs. abort; the transport's job is only to bucket whatever its protocol
/// library reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    /// Transport malfunction: unsupported protocol, feature not compiled
    /// in, out of memory. Fatal for the whole batch.
    Internal(String),
    /// Remote storage reported out of space during an upload.
    RemoteStorageFull,
    /// The protocol library rejected the URL.
    MalformedUrl,
    /// The remote resource does not exist.
    ContentNotFound,
    /// The remote rejected the credentials.
    LoginDenied,
    /// Host name lookup failed.
    HostNotFound,
    /// The host refused the connection.
    ConnectionRefused,
    /// TLS/SSL negotiation failed.
    TlsHandshake,
    /// A callback asked the transport to stop (user abort).
    Aborted,
    /// Anything else; eligible for a retry.
    Other(String),
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailure::Internal(reason) => write!(f, "transport malfunction: {}", reason),
            TransferFailure::RemoteStorageFull => write!(f, "remote storage full"),
            TransferFailure::MalformedUrl => write!(f, "malformed URL"),
            TransferFailure::ContentNotFound => write!(f, "remote resource not found"),
            TransferFailure::LoginDenied => write!(f, "login denied"),
            TransferFailure::HostNotFound => write!(f, "host lookup failed"),
            TransferFailure::ConnectionRefused => write!(f, "connection refused"),
            TransferFailure::TlsHandshake => write!(f, "TLS negotiation failed"),
            TransferFailure::Aborted => write!(f, "aborted by callback"),
            TransferFailure::Other(detail) => write!(f, "transfer failed: {}", detail),
        }
    }
}

/// Terminal result of one transfer, drained via [`Transport::harvest`].
#[derive(Debug)]
pub struct TransferOutcome {
    /// Slot the transfer was launched under.
    pub slot: usize,
    pub result: Result<(), TransferFailure>,
}

/// Error from the transport machinery itself (as opposed to a single
/// transfer failing). The engine treats any of these as internal.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to configure transfer: {0}")]
    Setup(String),
    #[error("failed to drive transfers: {0}")]
    Drive(String),
    #[error("unknown transfer slot {0}")]
    UnknownSlot(usize),
}

/// A multi-transfer driver.
///
/// One instance drives every transfer of one batch. Implementations are
/// used from a single worker thread and need not be `Send`; the engine
/// builds them on the worker through a [`TransportFactory`].
pub trait Transport {
    /// Creates and registers a transfer for `slot`.
    ///
    /// The transport appends downloaded bytes to the request payload,
    /// drains the payload through the request's read cursor for uploads,
    /// mirrors byte counters into the request, and observes `cancel` so an
    /// aborted batch fails its in-flight transfers with
    /// [`TransferFailure::Aborted`].
    fn launch(
        &mut self,
        slot: usize,
        plan: &TransferPlan,
        request: SharedRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), TransportError>;

    /// Performs one non-blocking drive of all registered transfers.
    fn drive(&mut self) -> Result<(), TransportError>;

    /// Blocks until transfer activity is likely, at most `timeout`.
    fn await_activity(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Drains the completion queue.
    fn harvest(&mut self) -> Vec<TransferOutcome>;

    /// Detaches the finished transfer in `slot`, resets it and registers it
    /// again under a fresh plan. Used by the retry path.
    fn relaunch(&mut self, slot: usize, plan: &TransferPlan) -> Result<(), TransportError>;

    /// Detaches and destroys every transfer.
    fn discard_all(&mut self);
}

/// Builds a transport on the batch worker thread.
///
/// libcurl multi handles are thread-affine, so the engine cannot construct
/// the driver up front and move it around; instead each batch constructs
/// its own on the thread that will drive it.
pub type TransportFactory = dyn Fn() -> Box<dyn Transport> + Send + Sync;
