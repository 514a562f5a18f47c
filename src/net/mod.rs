//! Value types shared between callers and the transfer engine.

pub mod bytes;
pub mod request;
pub mod url;

pub use bytes::{ByteBuffer, BufferError, MAX_FILE_IMPORT_BYTES};
pub use request::{Direction, Request, SharedRequest};
pub use url::{Scheme, Url, UrlParseError};
