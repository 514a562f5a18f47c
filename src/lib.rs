//! bytehaul - batch file transfers over FTP, FTPS, HTTP and HTTPS.
//!
//! This library provides "fire a batch, get notified" semantics: hand a
//! list of download or upload requests to the [`TransferManager`], and it
//! drives every transfer concurrently on a background worker, retries
//! transient failures up to a configurable bound, aggregates progress, and
//! reports lifecycle events (`started`, `progress`, `completed`, `failed`)
//! through registered callbacks.
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber in the
//! application to collect them.

pub mod manager;
pub mod net;
pub mod transport;

pub use manager::{options_to_text, Options, TransferError, TransferManager};
pub use net::{ByteBuffer, Direction, Request, Scheme, SharedRequest, Url};
