//! Resource locators for the four supported transfer schemes.
//!
//! A [`Url`] is the validated quadruple `(scheme, host, port, path)`. It can
//! be built from a string (`ftp://host:2121/dir/file`) or assembled field by
//! field; the engine checks [`Url::is_valid`] when a batch is submitted.
//!
//! A port of `0` means "default for the scheme" and is left to the transport
//! to resolve (21 for FTP, 990 for implicit FTPS, 80 for HTTP, 443 for
//! HTTPS).

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Transfer scheme of a [`Url`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Unknown or unsupported scheme. Input/error sentinel only: a valid
    /// locator never carries it.
    #[default]
    Unknown,
    /// Plain, unencrypted FTP (default port 21).
    Ftp,
    /// Implicit SSL/TLS encrypted FTP (default port 990). Security is
    /// enabled as soon as the connection starts.
    Ftps,
    /// Plain, unencrypted HTTP (default port 80).
    Http,
    /// HTTP over an SSL/TLS layer (default port 443).
    Https,
}

impl Scheme {
    /// Lowercase textual form, `"unknown"` for the sentinel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Unknown => "unknown",
            Scheme::Ftp => "ftp",
            Scheme::Ftps => "ftps",
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Parses a scheme name, case-insensitively.
    ///
    /// Returns [`Scheme::Unknown`] when the name matches no supported
    /// scheme.
    pub fn from_text(text: &str) -> Self {
        match text.to_ascii_lowercase().as_str() {
            "ftp" => Scheme::Ftp,
            "ftps" => Scheme::Ftps,
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => Scheme::Unknown,
        }
    }

    /// Well-known port the transport falls back to when a URL carries
    /// port `0`.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Unknown => 0,
            Scheme::Ftp => 21,
            Scheme::Ftps => 990,
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a URL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlParseError {
    /// Input doesn't match `scheme://host[:port]/path`.
    InvalidFormat,
    /// Scheme is not one of ftp, ftps, http, https.
    UnsupportedScheme(String),
    /// Port is not a decimal number in 0..=65535.
    InvalidPort(String),
    /// The path component (starting with `/`) is missing.
    MissingPath,
}

impl fmt::Display for UrlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlParseError::InvalidFormat => {
                write!(f, "input doesn't match scheme://host[:port]/path")
            }
            UrlParseError::UnsupportedScheme(s) => write!(f, "unsupported scheme: {}", s),
            UrlParseError::InvalidPort(s) => write!(f, "invalid port: {}", s),
            UrlParseError::MissingPath => write!(f, "path component is missing"),
        }
    }
}

impl std::error::Error for UrlParseError {}

/// Regex splitting a URL into scheme, host, optional port and path.
fn url_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\w+)://([^/:]+)(?::(\d+))?(/.*)?$").expect("URL regex must compile")
    })
}

/// A validated resource locator.
///
/// The default value is the cleared, invalid locator: all getters return
/// their empty/zero defaults and [`Url::to_url_string`] yields an empty
/// string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Url {
    /// Creates a cleared, invalid locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly parses `scheme://host[:port]/path`.
    ///
    /// The path starts with `/` and is required: a locator without one can
    /// never be valid, so parsing rejects it outright.
    pub fn parse(input: &str) -> Result<Self, UrlParseError> {
        let captures = url_regex()
            .captures(input)
            .ok_or(UrlParseError::InvalidFormat)?;

        let scheme = Scheme::from_text(&captures[1]);
        if scheme == Scheme::Unknown {
            return Err(UrlParseError::UnsupportedScheme(captures[1].to_string()));
        }

        let port = match captures.get(3) {
            Some(digits) => digits
                .as_str()
                .parse::<u16>()
                .map_err(|_| UrlParseError::InvalidPort(digits.as_str().to_string()))?,
            None => 0,
        };

        let path = captures
            .get(4)
            .map(|m| m.as_str().to_string())
            .ok_or(UrlParseError::MissingPath)?;

        Ok(Self {
            scheme,
            host: captures[2].to_string(),
            port,
            path,
        })
    }

    /// Parses `input` into this locator; failure leaves it cleared.
    pub fn set_url(&mut self, input: &str) {
        match Self::parse(input) {
            Ok(url) => *self = url,
            Err(err) => {
                warn!(url = input, %err, "failed to parse URL, clearing locator");
                self.clear();
            }
        }
    }

    /// Resets every field to its empty/zero default.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// A locator is valid when the scheme is supported and both host and
    /// path are set.
    pub fn is_valid(&self) -> bool {
        self.scheme != Scheme::Unknown && !self.host.is_empty() && !self.path.is_empty()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, `0` meaning "default for the scheme".
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Formats `scheme://host[:port]path`, omitting the port segment when it
    /// is `0`. Returns an empty string for an invalid locator.
    pub fn to_url_string(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }

        let mut url = format!("{}://{}", self.scheme, self.host);
        if self.port != 0 {
            url.push(':');
            url.push_str(&self.port.to_string());
        }
        url.push_str(&self.path);
        url
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ParseCase {
        input: &'static str,
        valid: bool,
        scheme: Scheme,
        host: &'static str,
        port: u16,
        path: &'static str,
    }

    #[test]
    fn test_parse_url_table() {
        let cases = [
            ParseCase {
                input: "https://example.com:8080/path/to/resource",
                valid: true,
                scheme: Scheme::Https,
                host: "example.com",
                port: 8080,
                path: "/path/to/resource",
            },
            ParseCase {
                input: "http://example.com:8080/path/to/resource",
                valid: true,
                scheme: Scheme::Http,
                host: "example.com",
                port: 8080,
                path: "/path/to/resource",
            },
            ParseCase {
                input: "https://example.com/path/to/resource",
                valid: true,
                scheme: Scheme::Https,
                host: "example.com",
                port: 0,
                path: "/path/to/resource",
            },
            ParseCase {
                input: "ftp://example.com:8080/path/to/resource.zip",
                valid: true,
                scheme: Scheme::Ftp,
                host: "example.com",
                port: 8080,
                path: "/path/to/resource.zip",
            },
            ParseCase {
                input: "ftps://example.com:8080/path/to/resource.zip",
                valid: true,
                scheme: Scheme::Ftps,
                host: "example.com",
                port: 8080,
                path: "/path/to/resource.zip",
            },
        ];

        for case in cases {
            let mut url = Url::new();
            url.set_url(case.input);

            assert_eq!(url.is_valid(), case.valid, "input: {}", case.input);
            assert_eq!(url.scheme(), case.scheme);
            assert_eq!(url.host(), case.host);
            assert_eq!(url.port(), case.port);
            assert_eq!(url.path(), case.path);

            // Formatting a parsed URL reproduces the input.
            assert_eq!(url.to_url_string(), case.input);
        }
    }

    #[test]
    fn test_parse_url_without_path_clears_locator() {
        let mut url = Url::new();
        url.set_url("https://example.com");

        assert!(!url.is_valid());
        assert_eq!(url.scheme(), Scheme::Unknown);
        assert_eq!(url.host(), "");
        assert_eq!(url.port(), 0);
        assert_eq!(url.path(), "");
        assert_eq!(url.to_url_string(), "");

        assert_eq!(Url::parse("https://example.com"), Err(UrlParseError::MissingPath));
    }

    #[test]
    fn test_parse_garbage_clears_locator() {
        let mut url = Url::new();
        url.set_host("leftover.example.com");
        url.set_url("not_an_url");

        assert!(!url.is_valid());
        assert_eq!(url.scheme(), Scheme::Unknown);
        assert_eq!(url.host(), "");
        assert_eq!(url.port(), 0);
        assert_eq!(url.path(), "");
    }

    #[test]
    fn test_parse_unknown_scheme_is_error() {
        assert_eq!(
            Url::parse("gopher://example.com/docs"),
            Err(UrlParseError::UnsupportedScheme("gopher".to_string()))
        );
    }

    #[test]
    fn test_parse_port_out_of_range() {
        assert!(matches!(
            Url::parse("http://example.com:99999/index.html"),
            Err(UrlParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_build_url_field_by_field() {
        let mut url = Url::new();
        url.set_scheme(Scheme::Ftp);
        url.set_host("files.example.com");
        url.set_path("/incoming/report.csv");

        assert!(url.is_valid());
        assert_eq!(url.to_url_string(), "ftp://files.example.com/incoming/report.csv");

        url.set_port(2121);
        assert_eq!(
            url.to_url_string(),
            "ftp://files.example.com:2121/incoming/report.csv"
        );
    }

    #[test]
    fn test_format_then_parse_round_trip() {
        let mut url = Url::new();
        url.set_scheme(Scheme::Https);
        url.set_host("example.com");
        url.set_port(8443);
        url.set_path("/a/b");

        let reparsed = Url::parse(&url.to_url_string()).unwrap();
        assert_eq!(reparsed, url);
    }

    #[test]
    fn test_scheme_text_round_trip() {
        for scheme in [Scheme::Ftp, Scheme::Ftps, Scheme::Http, Scheme::Https] {
            assert_eq!(Scheme::from_text(scheme.as_str()), scheme);
        }
        assert_eq!(Scheme::from_text("HTTPS"), Scheme::Https);
        assert_eq!(Scheme::from_text("gopher"), Scheme::Unknown);
        assert_eq!(Scheme::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Scheme::Ftp.default_port(), 21);
        assert_eq!(Scheme::Ftps.default_port(), 990);
        assert_eq!(Scheme::Http.default_port(), 80);
        assert_eq!(Scheme::Https.default_port(), 443);
        assert_eq!(Scheme::Unknown.default_port(), 0);
    }

    #[test]
    fn test_equality_covers_all_fields() {
        let a = Url::parse("http://example.com:80/x").unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);

        b.set_port(81);
        assert_ne!(a, b);
    }
}
