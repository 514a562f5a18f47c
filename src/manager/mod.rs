//! The transfer engine: batch validation, worker lifecycle, retries and
//! callback delivery.
//!
//! [`TransferManager`] performs bulk downloads or uploads of
//! [`Request`](crate::net::Request) lists over FTP, FTPS, HTTP and HTTPS.
//! `start_download`/`start_upload` validate synchronously, spawn a
//! background worker and return immediately; everything after that arrives
//! through the registered callbacks, serialized on the worker thread:
//! `started`, zero or more `progress` aggregates, then exactly one of
//! `completed` or `failed`.
//!
//! ```no_run
//! use bytehaul::manager::TransferManager;
//! use bytehaul::net::{Request, Url};
//!
//! let manager = TransferManager::new();
//! manager.on_completed(|direction| println!("{direction:?} finished"));
//! manager.on_failed(|direction, error| eprintln!("{direction:?} failed: {error}"));
//!
//! let mut request = Request::new();
//! request.configure_download(Url::parse("https://example.com/data.bin").unwrap());
//! manager.start_download(vec![request.into_shared()]).unwrap();
//!
//! while manager.in_progress() {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```

mod callbacks;
mod error;
mod options;
mod worker;

pub use callbacks::{CompletedCallback, FailedCallback, ProgressCallback, StartedCallback};
pub use error::TransferError;
pub use options::{options_to_text, Options};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

use crate::net::{Direction, SharedRequest};
use crate::transport::{CurlTransport, Transport, TransportFactory};
use callbacks::Callbacks;

/// Minimum acceptable transfer rate, in bytes per second. When the
/// observed rate stays below this for the configured transfer timeout, the
/// transfer fails (and is retried if budget remains).
pub const MIN_TRANSFER_SPEED: u32 = 30;

const DEFAULT_MAX_TRIALS: u32 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Engine configuration, snapshotted by the worker at prepare time and on
/// every retry.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub username: String,
    pub password: String,
    pub max_trials: u32,
    pub timeout_connect: Duration,
    pub timeout_transfer: Duration,
    pub options: Options,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            max_trials: DEFAULT_MAX_TRIALS,
            timeout_connect: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            timeout_transfer: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            options: Options::empty(),
        }
    }
}

/// The active batch: direction plus the shared request list. Only present
/// while a worker is running (or has just finished and not yet been
/// replaced).
pub(crate) struct Batch {
    pub direction: Direction,
    pub requests: Vec<SharedRequest>,
}

/// Everything guarded by the engine mutex.
#[derive(Default)]
pub(crate) struct EngineState {
    pub config: Config,
    pub callbacks: Callbacks,
    pub batch: Option<Batch>,
    pub job: Option<JoinHandle<()>>,
}

/// Batch transfer engine.
///
/// One batch runs at a time; a second `start_*` while a batch is active is
/// refused with [`TransferError::Busy`]. All methods are safe to call
/// concurrently with a running batch.
pub struct TransferManager {
    state: Arc<Mutex<EngineState>>,
    factory: Arc<TransportFactory>,
    cancel: Arc<AtomicBool>,
}

impl TransferManager {
    /// Creates an engine backed by the libcurl multi driver.
    pub fn new() -> Self {
        Self::with_transport_factory(|| Box::new(CurlTransport::new()) as Box<dyn Transport>)
    }

    /// Creates an engine with a custom transport, built on the worker
    /// thread at the start of every batch. Intended for tests and
    /// instrumentation.
    pub fn with_transport_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Transport> + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            factory: Arc::new(factory),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts downloading `requests`.
    ///
    /// Validates synchronously, then spawns the batch worker and returns.
    /// Each request must be configured for download with a valid URL, and
    /// must stay alive until [`TransferManager::in_progress`] observes
    /// false. Progress and termination are reported through the callbacks;
    /// a validation error produces no callback at all.
    pub fn start_download(&self, requests: Vec<SharedRequest>) -> Result<(), TransferError> {
        self.start(Direction::Download, requests)
    }

    /// Starts uploading `requests`.
    ///
    /// Same contract as [`TransferManager::start_download`]; additionally
    /// every payload must be non-empty.
    pub fn start_upload(&self, requests: Vec<SharedRequest>) -> Result<(), TransferError> {
        self.start(Direction::Upload, requests)
    }

    fn start(
        &self,
        direction: Direction,
        requests: Vec<SharedRequest>,
    ) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();

        if state.job.as_ref().is_some_and(|job| !job.is_finished()) {
            error!(?direction, "unable to start transfer, batch already in progress");
            return Err(TransferError::Busy);
        }

        if requests.is_empty() {
            error!(?direction, "list of requests is empty, no transfer to perform");
            return Err(TransferError::InvalidRequest);
        }

        for shared in &requests {
            let request = shared.lock().unwrap();

            if request.direction() != direction {
                error!(
                    expected = ?direction,
                    received = ?request.direction(),
                    "received request with a transfer direction different than expected"
                );
                return Err(TransferError::InvalidRequest);
            }

            if !request.url().is_valid() {
                error!(
                    scheme = %request.url().scheme(),
                    host = request.url().host(),
                    path = request.url().path(),
                    "received request with an invalid URL"
                );
                return Err(TransferError::InvalidRequest);
            }

            if direction == Direction::Upload && request.payload().is_empty() {
                error!(url = %request.url(), "received upload request with an empty payload");
                return Err(TransferError::InvalidRequest);
            }
        }

        state.batch = Some(Batch {
            direction,
            requests,
        });
        self.cancel.store(false, Ordering::Relaxed);

        let worker_state = Arc::clone(&self.state);
        let factory = Arc::clone(&self.factory);
        let cancel = Arc::clone(&self.cancel);
        let spawned = thread::Builder::new()
            .name("transfer-batch".to_string())
            .spawn(move || worker::run(worker_state, factory, cancel));

        match spawned {
            Ok(handle) => {
                state.job = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!(%err, "failed to spawn batch worker");
                state.batch = None;
                Err(TransferError::Internal)
            }
        }
    }

    /// Requests the running batch to stop.
    ///
    /// The worker observes the flag within one poll interval (at most one
    /// second) and the batch terminates with
    /// [`TransferError::UserAbort`]. Calling this with no batch running is
    /// a no-op.
    pub fn abort(&self) {
        if self.in_progress() {
            debug!("abort requested for running batch");
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// True while a batch worker exists and has not finished.
    pub fn in_progress(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.job.as_ref().is_some_and(|job| !job.is_finished())
    }

    /// Sets the credentials forwarded to FTP/FTPS transfers. Invalid
    /// credentials surface as [`TransferError::InvalidLogin`].
    pub fn set_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.config.username = username.into();
        state.config.password = password.into();
    }

    /// Currently configured `(username, password)` pair.
    pub fn credentials(&self) -> (String, String) {
        let state = self.state.lock().unwrap();
        (state.config.username.clone(), state.config.password.clone())
    }

    /// Sets the number of retries allowed per request beyond its first
    /// attempt. `0` disables retrying. Default: 1.
    pub fn set_max_trials(&self, trials: u32) {
        self.state.lock().unwrap().config.max_trials = trials;
    }

    pub fn max_trials(&self) -> u32 {
        self.state.lock().unwrap().config.max_trials
    }

    /// Bounds the connection phase (name resolution, handshakes) in
    /// seconds. `0` disables the bound. Default: 10.
    pub fn set_timeout_connect(&self, seconds: u64) {
        self.state.lock().unwrap().config.timeout_connect = Duration::from_secs(seconds);
    }

    pub fn timeout_connect(&self) -> u64 {
        self.state.lock().unwrap().config.timeout_connect.as_secs()
    }

    /// Arms the minimum-speed watchdog: a transfer whose rate stays below
    /// [`MIN_TRANSFER_SPEED`] for this many seconds fails (and is retried
    /// while budget remains). `0` disables the watchdog. Default: 10.
    pub fn set_timeout_transfer(&self, seconds: u64) {
        self.state.lock().unwrap().config.timeout_transfer = Duration::from_secs(seconds);
    }

    pub fn timeout_transfer(&self) -> u64 {
        self.state.lock().unwrap().config.timeout_transfer.as_secs()
    }

    /// Replaces the option flags. Default: empty.
    pub fn set_options(&self, options: Options) {
        self.state.lock().unwrap().config.options = options;
    }

    pub fn options(&self) -> Options {
        self.state.lock().unwrap().config.options
    }

    /// Registers the `started` callback, replacing the logging default.
    pub fn on_started<F>(&self, callback: F)
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().callbacks.started = Arc::new(callback);
    }

    /// Registers the `progress` callback, replacing the logging default.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(Direction, u64, u64) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().callbacks.progress = Arc::new(callback);
    }

    /// Registers the `completed` callback, replacing the logging default.
    pub fn on_completed<F>(&self, callback: F)
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().callbacks.completed = Arc::new(callback);
    }

    /// Registers the `failed` callback, replacing the logging default.
    pub fn on_failed<F>(&self, callback: F)
    where
        F: Fn(Direction, TransferError) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().callbacks.failed = Arc::new(callback);
    }

    /// Converts aggregate progress counters to a percentage.
    ///
    /// Returns `0.0` when `total` is zero (size not yet known) instead of
    /// dividing by zero.
    pub fn progress_to_percent(total: u64, current: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        (current as f64 / total as f64) * 100.0
    }
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransferManager {
    /// Aborts any running batch and joins the worker, bounded by the 1 s
    /// poll interval.
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let job = match self.state.lock() {
            Ok(mut state) => state.job.take(),
            Err(_) => None,
        };
        if let Some(job) = job {
            let _ = job.join();
        }
    }
}
