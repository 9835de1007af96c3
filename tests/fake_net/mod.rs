//! Fake network servers for integration testing
//!
//! In-process servers bound to `127.0.0.1:0` that speak just enough of
//! each protocol to exercise the helpers end-to-end and record what the
//! client sent.
//!
//! ## Module layout
//!
//! - `http` -- one canned response per server, records each request
//! - `smtp` -- greeting, EHLO, AUTH, MAIL/RCPT/DATA, QUIT
//! - `tls` -- TLS line-echo server, optionally demanding a client cert
//! - `cert` -- self-signed `rcgen` certificates and TLS acceptors
//! - `io` -- shared write helpers
//!
//! The `http` and `smtp` servers also have TLS variants built on `cert`.

#![allow(dead_code)]

pub mod cert;
pub mod smtp;
pub mod tls;

// Each test binary uses a different subset of the fakes.
#[allow(unused_imports)]
pub use http::{CannedResponse, FakeHttpServer};
#[allow(unused_imports)]
pub use smtp::FakeSmtpServer;
#[allow(unused_imports)]
pub use tls::FakeTlsServer;

/// A port on 127.0.0.1 with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    listener.local_addr().unwrap().port()
}
