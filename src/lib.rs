//! Networking convenience helpers
//!
//! Short-lived wrappers over established client stacks:
//!
//! - [`tcp`]: connect, send, grab a banner, listen, accept once
//! - [`tls`]: rustls client sockets with a small verify-mode table
//! - [`smtp`]: lettre sessions and [`EmailMessage`] submission
//! - [`http`]: reqwest requests for GET, POST, HEAD and the WebDAV verbs
//! - [`external_ip`]: public address via a checkip page
//!
//! Every `session` helper closes its connection on every exit path of
//! the caller's body. Library errors are passed through in [`Error`].

mod config;
mod error;
mod message;
mod session;
mod verify;

pub mod external_ip;
pub mod http;
pub mod smtp;
pub mod tcp;
pub mod tls;

pub use config::{
    DefaultPorts, HttpOptions, IMAP_PORT, ListenOptions, ProxyOptions, SMTP_PORT, SmtpOptions,
    TcpOptions, TlsOptions,
};
pub use error::{Error, Result};
pub use http::{ExpandedOptions, HttpMethod, HttpSession};
pub use message::EmailMessage;
pub use smtp::{AuthMechanism, SmtpSession};
pub use verify::{CertVerification, VerifyMode};
