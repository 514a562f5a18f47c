//! Per-transfer callback adapters bridging libcurl to a shared request.

use curl::easy::{Handler, ReadError, WriteError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::net::{Direction, SharedRequest};

/// Handler installed on every easy-transfer.
///
/// Write, read and progress callbacks all funnel into the shared request:
/// downloads append into the payload, uploads drain it through the read
/// cursor, and the progress callback mirrors the transfer counters and
/// observes the batch cancel flag.
pub(crate) struct TransferHandler {
    request: SharedRequest,
    direction: Direction,
    cancel: Arc<AtomicBool>,
}

impl TransferHandler {
    pub(crate) fn new(
        request: SharedRequest,
        direction: Direction,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            request,
            direction,
            cancel,
        }
    }

    pub(crate) fn request(&self) -> SharedRequest {
        self.request.clone()
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }
}

impl Handler for TransferHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        // Server chatter during an upload (HTTP response bodies, FTP
        // status lines routed through the body) is not payload; swallow it.
        if self.direction != Direction::Download {
            return Ok(data.len());
        }

        let Ok(mut request) = self.request.lock() else {
            // Poisoned request lock: reporting fewer bytes than delivered
            // fails the transfer.
            return Ok(0);
        };
        request.payload_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, ReadError> {
        if self.direction != Direction::Upload {
            return Ok(0);
        }

        let Ok(mut request) = self.request.lock() else {
            return Err(ReadError::Abort);
        };
        Ok(request.io_read(data))
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, ultotal: f64, ulnow: f64) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            return false;
        }

        let Ok(mut request) = self.request.lock() else {
            return false;
        };
        match self.direction {
            Direction::Download => {
                request.set_size_total(dltotal as u64);
                request.set_size_current(dlnow as u64);
            }
            Direction::Upload => {
                request.set_size_total(ultotal as u64);
                request.set_size_current(ulnow as u64);
            }
            Direction::Unknown => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ByteBuffer, Request, Url};
    use std::sync::Mutex;

    fn shared_download() -> SharedRequest {
        let mut request = Request::new();
        request.configure_download(Url::parse("http://example.com/file").unwrap());
        Arc::new(Mutex::new(request))
    }

    fn shared_upload(payload: &[u8]) -> SharedRequest {
        let mut request = Request::new();
        request.configure_upload(
            Url::parse("ftp://example.com/file").unwrap(),
            ByteBuffer::from(payload),
        );
        Arc::new(Mutex::new(request))
    }

    #[test]
    fn test_write_appends_to_download_payload() {
        let request = shared_download();
        let mut handler = TransferHandler::new(
            request.clone(),
            Direction::Download,
            Arc::new(AtomicBool::new(false)),
        );

        assert_eq!(handler.write(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(handler.write(&[4]).unwrap(), 1);
        assert_eq!(request.lock().unwrap().payload().as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_write_discards_upload_response_body() {
        let request = shared_upload(&[9, 9]);
        let mut handler = TransferHandler::new(
            request.clone(),
            Direction::Upload,
            Arc::new(AtomicBool::new(false)),
        );

        assert_eq!(handler.write(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(request.lock().unwrap().payload().as_slice(), &[9, 9]);
    }

    #[test]
    fn test_read_drains_payload_and_signals_eof() {
        let request = shared_upload(&[1, 2, 3]);
        let mut handler = TransferHandler::new(
            request.clone(),
            Direction::Upload,
            Arc::new(AtomicBool::new(false)),
        );

        let mut buf = [0u8; 2];
        assert_eq!(handler.read(&mut buf).unwrap(), 2);
        assert_eq!(handler.read(&mut buf).unwrap(), 1);
        assert_eq!(handler.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_progress_mirrors_direction_counters() {
        let request = shared_download();
        let mut handler = TransferHandler::new(
            request.clone(),
            Direction::Download,
            Arc::new(AtomicBool::new(false)),
        );

        assert!(handler.progress(100.0, 25.0, 0.0, 0.0));
        let guard = request.lock().unwrap();
        assert_eq!(guard.size_total(), 100);
        assert_eq!(guard.size_current(), 25);
    }

    #[test]
    fn test_progress_upload_uses_upload_counters() {
        let request = shared_upload(&[1]);
        let mut handler = TransferHandler::new(
            request.clone(),
            Direction::Upload,
            Arc::new(AtomicBool::new(false)),
        );

        assert!(handler.progress(50.0, 10.0, 200.0, 80.0));
        let guard = request.lock().unwrap();
        assert_eq!(guard.size_total(), 200);
        assert_eq!(guard.size_current(), 80);
    }

    #[test]
    fn test_progress_aborts_when_cancelled() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut handler =
            TransferHandler::new(shared_download(), Direction::Download, cancel.clone());

        assert!(handler.progress(10.0, 1.0, 0.0, 0.0));
        cancel.store(true, Ordering::Relaxed);
        assert!(!handler.progress(10.0, 2.0, 0.0, 0.0));
    }
}
