//! TLS certificate verification modes
//!
//! A fixed table of verification policies and the rustls behavior each
//! one selects. Unknown names do not error; they fall back to the TLS
//! library's default policy.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// How strictly the peer certificate is checked during a handshake.
///
/// # Examples
///
/// ```
/// use net_helpers::VerifyMode;
///
/// assert_eq!(VerifyMode::parse("peer"), Some(VerifyMode::Peer));
/// assert_eq!(VerifyMode::parse("sometimes"), None);
/// assert_eq!(VerifyMode::None.as_str(), "none");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyMode {
    /// Accept any certificate.
    None,
    /// Verify the peer certificate chain and name.
    Peer,
    /// Verify the peer, requesting its certificate only once.
    ClientOnce,
    /// Verify the peer and fail if it presents no certificate.
    FailIfNoPeerCert,
}

/// The verifier a [`VerifyMode`] selects in rustls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertVerification {
    /// Skip certificate validation entirely.
    AcceptAny,
    /// Validate against the bundled web PKI roots.
    WebPki,
}

impl VerifyMode {
    pub const ALL: [Self; 4] = [
        Self::None,
        Self::Peer,
        Self::ClientOnce,
        Self::FailIfNoPeerCert,
    ];

    /// Look up a mode by name, returning `None` for anything unknown.
    ///
    /// Matching ignores case and treats `-` like `_`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Peer => "peer",
            Self::ClientOnce => "client_once",
            Self::FailIfNoPeerCert => "fail_if_no_peer_cert",
        }
    }

    /// The conventional numeric verify flag for this mode.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Peer => 1,
            Self::FailIfNoPeerCert => 2,
            Self::ClientOnce => 4,
        }
    }

    /// The rustls verifier this mode selects.
    #[must_use]
    pub const fn verification(self) -> CertVerification {
        match self {
            Self::None => CertVerification::AcceptAny,
            Self::Peer | Self::ClientOnce | Self::FailIfNoPeerCert => CertVerification::WebPki,
        }
    }
}

/// Resolve an optional mode, using the library default when absent.
#[must_use]
pub const fn resolve(mode: Option<VerifyMode>) -> CertVerification {
    match mode {
        Some(mode) => mode.verification(),
        None => CertVerification::WebPki,
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerifyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::Config(format!("Unknown verify mode: {s}")))
    }
}
