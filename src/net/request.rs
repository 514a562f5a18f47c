//! Transfer requests and their per-request I/O accounting.
//!
//! A [`Request`] bundles a direction, a target [`Url`] and the payload
//! [`ByteBuffer`]. The engine and the caller share each request for the
//! duration of a batch through [`SharedRequest`]; the caller reads the
//! payload back (download) or keeps it (upload) once the batch has
//! finished.
//!
//! Requests are deliberately not `Clone`: a batch owns its requests through
//! shared handles, never through copies.

use std::sync::{Arc, Mutex};

use super::bytes::ByteBuffer;
use super::url::Url;

/// Whether a request fills its payload or drains it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Not yet configured. Submitting a request in this state is rejected.
    #[default]
    Unknown,
    /// Fetch the remote resource into the payload.
    Download,
    /// Send the payload to the remote resource.
    Upload,
}

/// Shared handle through which the caller and the batch worker both own a
/// request. The handle must stay alive until the batch is observed
/// complete.
pub type SharedRequest = Arc<Mutex<Request>>;

/// One resource to download or upload.
#[derive(Debug, Default)]
pub struct Request {
    direction: Direction,
    url: Url,
    payload: ByteBuffer,

    /// Upload read position: bytes already handed to the transport.
    read_cursor: usize,
    size_total: u64,
    size_current: u64,
    /// Additional attempts used so far; 0 while on the first attempt.
    trials: u32,
}

impl Request {
    /// Creates an unconfigured request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the request to its unconfigured state, dropping the payload.
    pub fn clear(&mut self) {
        self.direction = Direction::Unknown;
        self.url.clear();
        self.payload.clear();
        self.io_reset();
    }

    /// Configures a download of `url`. The payload starts empty and grows
    /// as bytes arrive.
    pub fn configure_download(&mut self, url: Url) {
        self.io_reset();
        self.direction = Direction::Download;
        self.url = url;
        self.payload.clear();
    }

    /// Configures an upload of `payload` to `url`. The payload must be
    /// non-empty by the time the request is submitted.
    pub fn configure_upload(&mut self, url: Url, payload: ByteBuffer) {
        self.io_reset();
        self.direction = Direction::Upload;
        self.url = url;
        self.payload = payload;
    }

    /// Wraps the request into the shared handle form the engine consumes.
    pub fn into_shared(self) -> SharedRequest {
        Arc::new(Mutex::new(self))
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn payload(&self) -> &ByteBuffer {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut ByteBuffer {
        &mut self.payload
    }

    /// Copies up to `buf.len()` payload bytes starting at the read cursor
    /// and advances the cursor. Returns the number of bytes copied; `0`
    /// signals end of input.
    pub fn io_read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.payload.len().saturating_sub(self.read_cursor);
        let count = buf.len().min(remaining);
        buf[..count]
            .copy_from_slice(&self.payload.as_slice()[self.read_cursor..self.read_cursor + count]);
        self.read_cursor += count;
        count
    }

    /// Zeros the read cursor, the byte counters and the trial count.
    /// Direction, locator and payload are untouched. Idempotent.
    pub fn io_reset(&mut self) {
        self.read_cursor = 0;
        self.size_total = 0;
        self.size_current = 0;
        self.trials = 0;
    }

    /// Rewinds transfer state for a retry: cursor and counters go back to
    /// zero and a partially filled download payload is dropped. The trial
    /// count is preserved — it is the retry ledger.
    pub(crate) fn rewind_for_retry(&mut self) {
        self.read_cursor = 0;
        self.size_total = 0;
        self.size_current = 0;
        if self.direction == Direction::Download {
            self.payload.clear();
        }
    }

    /// Records one more attempt.
    pub fn register_trial(&mut self) {
        self.trials += 1;
    }

    pub fn trials(&self) -> u32 {
        self.trials
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn size_total(&self) -> u64 {
        self.size_total
    }

    pub fn size_current(&self) -> u64 {
        self.size_current
    }

    pub fn set_size_total(&mut self, size: u64) {
        self.size_total = size;
    }

    pub fn set_size_current(&mut self, size: u64) {
        self.size_current = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::url::Scheme;

    fn sample_url() -> Url {
        Url::parse("ftp://files.example.com/incoming/data.bin").unwrap()
    }

    #[test]
    fn test_new_request_is_unconfigured() {
        let request = Request::new();
        assert_eq!(request.direction(), Direction::Unknown);
        assert!(!request.url().is_valid());
        assert!(request.payload().is_empty());
        assert_eq!(request.trials(), 0);
    }

    #[test]
    fn test_configure_download() {
        let mut request = Request::new();
        request.payload_mut().push(0xEE); // stale payload from earlier use
        request.configure_download(sample_url());

        assert_eq!(request.direction(), Direction::Download);
        assert_eq!(request.url().scheme(), Scheme::Ftp);
        assert!(request.payload().is_empty());
        assert_eq!(request.size_total(), 0);
        assert_eq!(request.size_current(), 0);
        assert_eq!(request.read_cursor(), 0);
    }

    #[test]
    fn test_configure_upload() {
        let mut data = ByteBuffer::new();
        data.set_from_text("payload");

        let mut request = Request::new();
        request.configure_upload(sample_url(), data);

        assert_eq!(request.direction(), Direction::Upload);
        assert_eq!(request.payload().to_text(), "payload");
        assert_eq!(request.read_cursor(), 0);
    }

    #[test]
    fn test_io_read_drains_payload_in_chunks() {
        let mut request = Request::new();
        request.configure_upload(sample_url(), ByteBuffer::from(vec![1, 2, 3, 4, 5]));

        let mut chunk = [0u8; 2];
        assert_eq!(request.io_read(&mut chunk), 2);
        assert_eq!(chunk, [1, 2]);

        assert_eq!(request.io_read(&mut chunk), 2);
        assert_eq!(chunk, [3, 4]);

        assert_eq!(request.io_read(&mut chunk), 1);
        assert_eq!(chunk[0], 5);

        // Cursor at the end: end of input.
        assert_eq!(request.io_read(&mut chunk), 0);
        assert_eq!(request.read_cursor(), 5);
    }

    #[test]
    fn test_io_reset_is_idempotent_and_preserves_identity() {
        let mut request = Request::new();
        request.configure_upload(sample_url(), ByteBuffer::from(vec![9, 9]));

        let mut chunk = [0u8; 8];
        request.io_read(&mut chunk);
        request.set_size_total(100);
        request.set_size_current(40);
        request.register_trial();

        request.io_reset();
        request.io_reset();

        assert_eq!(request.read_cursor(), 0);
        assert_eq!(request.size_total(), 0);
        assert_eq!(request.size_current(), 0);
        assert_eq!(request.trials(), 0);
        assert_eq!(request.direction(), Direction::Upload);
        assert_eq!(request.payload().as_slice(), &[9, 9]);
        assert!(request.url().is_valid());
    }

    #[test]
    fn test_rewind_for_retry_keeps_trials_and_upload_payload() {
        let mut request = Request::new();
        request.configure_upload(sample_url(), ByteBuffer::from(vec![7, 8]));

        let mut chunk = [0u8; 1];
        request.io_read(&mut chunk);
        request.register_trial();
        request.rewind_for_retry();

        assert_eq!(request.read_cursor(), 0);
        assert_eq!(request.trials(), 1);
        assert_eq!(request.payload().as_slice(), &[7, 8]);
    }

    #[test]
    fn test_rewind_for_retry_drops_partial_download() {
        let mut request = Request::new();
        request.configure_download(sample_url());
        request.payload_mut().extend_from_slice(&[1, 2, 3]);
        request.set_size_current(3);

        request.rewind_for_retry();

        assert!(request.payload().is_empty());
        assert_eq!(request.size_current(), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut request = Request::new();
        request.configure_upload(sample_url(), ByteBuffer::from(vec![1]));
        request.register_trial();

        request.clear();

        assert_eq!(request.direction(), Direction::Unknown);
        assert!(!request.url().is_valid());
        assert!(request.payload().is_empty());
        assert_eq!(request.trials(), 0);
    }
}
