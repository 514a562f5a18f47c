//! libcurl multi driver: the production [`Transport`].
//!
//! One [`CurlTransport`] owns one `Multi` handle and one easy-transfer per
//! request slot. libcurl covers all four supported schemes on a single
//! driver, applies default ports for URLs without one, negotiates implicit
//! TLS for `ftps://` and `https://`, and enforces the connect timeout and
//! the minimum-speed watchdog natively.

use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Multi};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::trace;

use super::handler::TransferHandler;
use super::{TransferFailure, TransferOutcome, TransferPlan, Transport, TransportError};
use crate::net::{Direction, SharedRequest};

/// libcurl requires one-time process-global initialization before any
/// handle exists; repeated calls are no-ops.
fn ensure_global_init() {
    static INIT: Once = Once::new();
    INIT.call_once(curl::init);
}

/// Multi-transfer driver over libcurl.
pub struct CurlTransport {
    multi: Multi,
    slots: HashMap<usize, Easy2Handle<TransferHandler>>,
}

impl CurlTransport {
    pub fn new() -> Self {
        ensure_global_init();
        Self {
            multi: Multi::new(),
            slots: HashMap::new(),
        }
    }

    fn configure(
        easy: &mut Easy2<TransferHandler>,
        plan: &TransferPlan,
    ) -> Result<(), curl::Error> {
        easy.url(&plan.url)?;
        easy.connect_timeout(plan.connect_timeout)?;

        // Minimum-speed watchdog: fail when the rate stays below the limit
        // for the configured time. A zero time disables it.
        easy.low_speed_limit(plan.low_speed_limit)?;
        easy.low_speed_time(plan.low_speed_time)?;

        // Byte counters and cancellation flow through the progress callback.
        easy.progress(true)?;

        if let Some(credentials) = &plan.credentials {
            easy.username(&credentials.username)?;
            easy.password(&credentials.password)?;
        }

        if plan.direction == Direction::Upload {
            easy.upload(true)?;
            easy.in_filesize(plan.upload_size)?;
            if plan.create_missing_dirs {
                unsafe {
                    curl_sys::curl_easy_setopt(
                        easy.raw(),
                        curl_sys::CURLOPT_FTP_CREATE_MISSING_DIRS,
                        1,
                    );
                }
            }
        }

        Ok(())
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for CurlTransport {
    fn launch(
        &mut self,
        slot: usize,
        plan: &TransferPlan,
        request: SharedRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), TransportError> {
        let mut easy = Easy2::new(TransferHandler::new(request, plan.direction, cancel));
        Self::configure(&mut easy, plan).map_err(|e| TransportError::Setup(e.to_string()))?;

        let mut handle = self
            .multi
            .add2(easy)
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        handle
            .set_token(slot)
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        trace!(slot, url = %plan.url, "transfer registered");
        self.slots.insert(slot, handle);
        Ok(())
    }

    fn drive(&mut self) -> Result<(), TransportError> {
        self.multi
            .perform()
            .map(|_| ())
            .map_err(|e| TransportError::Drive(e.to_string()))
    }

    fn await_activity(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.multi
            .wait(&mut [], timeout)
            .map(|_| ())
            .map_err(|e| TransportError::Drive(e.to_string()))
    }

    fn harvest(&mut self) -> Vec<TransferOutcome> {
        let mut outcomes = Vec::new();
        self.multi.messages(|message| {
            let Ok(slot) = message.token() else {
                return;
            };
            if let Some(result) = message.result() {
                outcomes.push(TransferOutcome {
                    slot,
                    result: result.map_err(classify_error),
                });
            }
        });
        outcomes
    }

    fn relaunch(&mut self, slot: usize, plan: &TransferPlan) -> Result<(), TransportError> {
        let handle = self
            .slots
            .remove(&slot)
            .ok_or(TransportError::UnknownSlot(slot))?;
        let easy = self
            .multi
            .remove2(handle)
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let request = easy.get_ref().request();
        let cancel = easy.get_ref().cancel_flag();
        drop(easy);

        // A fresh easy-transfer is a full reset; reconfigure from the plan.
        self.launch(slot, plan, request, cancel)
    }

    fn discard_all(&mut self) {
        for (_, handle) in self.slots.drain() {
            let _ = self.multi.remove2(handle);
        }
    }
}

/// `CURLE_NOT_BUILT_IN` (4) — not exposed as a constant by this curl-sys version.
const CURLE_NOT_BUILT_IN_VALUE: curl_sys::CURLcode = 4;

/// Maps a libcurl per-transfer error onto the stable failure taxonomy.
fn classify_error(error: curl::Error) -> TransferFailure {
    let code = error.code();

    if error.is_unsupported_protocol()
        || code == CURLE_NOT_BUILT_IN_VALUE
        || code == curl_sys::CURLE_OUT_OF_MEMORY
    {
        return TransferFailure::Internal(error.to_string());
    }
    if code == curl_sys::CURLE_REMOTE_DISK_FULL {
        return TransferFailure::RemoteStorageFull;
    }
    if error.is_url_malformed() {
        return TransferFailure::MalformedUrl;
    }
    if code == curl_sys::CURLE_REMOTE_FILE_NOT_FOUND {
        return TransferFailure::ContentNotFound;
    }
    if code == curl_sys::CURLE_LOGIN_DENIED {
        return TransferFailure::LoginDenied;
    }
    if error.is_couldnt_resolve_host() {
        return TransferFailure::HostNotFound;
    }
    if error.is_couldnt_connect() {
        return TransferFailure::ConnectionRefused;
    }
    if error.is_ssl_connect_error()
        || error.is_peer_failed_verification()
        || error.is_ssl_certproblem()
    {
        return TransferFailure::TlsHandshake;
    }
    if error.is_aborted_by_callback() {
        return TransferFailure::Aborted;
    }

    TransferFailure::Other(error.to_string())
}
