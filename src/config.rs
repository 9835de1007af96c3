//! Per-operation connection options and default port settings

use crate::error::{Error, Result};
use crate::smtp::AuthMechanism;
use crate::verify::VerifyMode;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Standard IMAP port (RFC 3501).
pub const IMAP_PORT: u16 = 143;

/// Standard SMTP port, as used by the mail delegate.
pub const SMTP_PORT: u16 = lettre::transport::smtp::SMTP_PORT;

/// Default ports for IMAP and SMTP.
///
/// Unset values read as the protocol standard. This is an ordinary
/// value owned by the caller; share it the way you would share any
/// other configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultPorts {
    imap: Option<u16>,
    smtp: Option<u16>,
}

impl DefaultPorts {
    /// Load port overrides from the environment
    ///
    /// Reads from `.env` file if present. Optional variables:
    /// - `IMAP_PORT` (default: `143`)
    /// - `SMTP_PORT` (default: `25`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            imap: env_parsed("IMAP_PORT")?,
            smtp: env_parsed("SMTP_PORT")?,
        })
    }

    #[must_use]
    pub fn imap_port(&self) -> u16 {
        self.imap.unwrap_or(IMAP_PORT)
    }

    pub const fn set_imap_port(&mut self, port: u16) {
        self.imap = Some(port);
    }

    #[must_use]
    pub fn smtp_port(&self) -> u16 {
        self.smtp.unwrap_or(SMTP_PORT)
    }

    pub const fn set_smtp_port(&mut self, port: u16) {
        self.smtp = Some(port);
    }
}

/// Options for opening a client TCP socket.
#[derive(Debug, Clone, Default)]
pub struct TcpOptions {
    pub host: String,
    pub port: u16,
    /// Local address to bind before connecting.
    pub local_host: Option<String>,
    /// Local port to bind before connecting. `0` lets the OS pick.
    pub local_port: Option<u16>,
}

impl TcpOptions {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

/// Options for a listening socket.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
}

impl ListenOptions {
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            backlog: 3,
        }
    }
}

/// Options for a TLS client socket.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub tcp: TcpOptions,
    /// `None` means the TLS library's default verification.
    pub verify: Option<VerifyMode>,
    /// PEM client certificate chain.
    pub cert: Option<PathBuf>,
    /// PEM private key matching `cert`.
    pub key: Option<PathBuf>,
    /// Server name for SNI and certificate checks; falls back to the
    /// TCP host.
    pub sni: Option<String>,
}

impl TlsOptions {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            tcp: TcpOptions::new(host, port),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_verify(mut self, verify: VerifyMode) -> Self {
        self.verify = Some(verify);
        self
    }
}

/// Options for an SMTP session.
#[derive(Debug, Clone, Default)]
pub struct SmtpOptions {
    /// Server port; `None` uses [`DefaultPorts::smtp_port`].
    pub port: Option<u16>,
    /// Domain announced in the greeting.
    pub helo: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub auth: Option<AuthMechanism>,
    /// Wrap the connection in TLS from the first byte.
    pub tls: bool,
    /// Certificate check for `tls`; absent means full verification.
    pub verify: Option<VerifyMode>,
    pub ports: DefaultPorts,
}

impl SmtpOptions {
    /// Load SMTP options from environment variables
    ///
    /// Reads from `.env` file if present. Returns the server host along
    /// with the options. Optional variables:
    /// - `SMTP_HOST` (default: `127.0.0.1`)
    /// - `SMTP_PORT`, `SMTP_HELO`, `SMTP_USER`, `SMTP_PASSWORD`
    /// - `SMTP_AUTH` (`login`, `plain` or `cram_md5`)
    /// - `SMTP_TLS` (`true`/`false`, default `false`)
    /// - `SMTP_VERIFY` (`none`, `peer`, ...; default `peer`)
    pub fn from_env() -> Result<(String, Self)> {
        dotenvy::dotenv().ok();

        let host = env::var("SMTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let options = Self {
            port: env_parsed("SMTP_PORT")?,
            helo: env::var("SMTP_HELO").ok(),
            user: env::var("SMTP_USER").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            auth: env_parsed("SMTP_AUTH")?,
            tls: env_parsed("SMTP_TLS")?.unwrap_or(false),
            verify: env_parsed("SMTP_VERIFY")?,
            ports: DefaultPorts::from_env()?,
        };
        Ok((host, options))
    }

    #[must_use]
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.ports.smtp_port())
    }
}

/// Proxy settings for HTTP requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyOptions {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Options for an HTTP request.
///
/// Either `url` or `host` must be set. With a `url`, the discrete
/// `host`/`port`/`path`/`ssl` fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    /// Extra query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    pub ssl: bool,
    pub verify: Option<VerifyMode>,
    pub proxy: Option<ProxyOptions>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Sent as `application/x-www-form-urlencoded`; ignored when `body`
    /// is set.
    pub form_data: Vec<(String, String)>,
    /// Overrides the verb a helper would pick.
    pub method: Option<String>,
    pub local_host: Option<String>,
}

impl HttpOptions {
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
