//! Error types for net-helpers
//!
//! Failures from the delegated stacks are carried through unchanged;
//! only option validation produces errors of its own.

use crate::smtp::AuthMechanism;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Message error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Unsupported SMTP auth mechanism: {0}")]
    UnsupportedAuth(AuthMechanism),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No address resolved for {0}")]
    NoAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
