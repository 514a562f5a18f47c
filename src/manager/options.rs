//! Engine option flags.

use bitflags::bitflags;

bitflags! {
    /// Behaviour toggles applied to every transfer of a batch.
    ///
    /// Bit 0 is [`Options::FTP_CREATE_DIRS`]; all other bits are reserved.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u32 {
        /// Create missing remote directories when uploading over FTP/FTPS.
        const FTP_CREATE_DIRS = 1 << 0;
    }
}

/// Renders an option set for logs and diagnostics.
///
/// An empty set renders as `"NONE"`; otherwise the names of the set bits
/// are joined with `separator` in ascending bit order.
pub fn options_to_text(options: Options, separator: char) -> String {
    if options.is_empty() {
        return "NONE".to_string();
    }

    options
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}
