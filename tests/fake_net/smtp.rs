//! In-process fake SMTP server
//!
//! Speaks the handful of commands a submission client needs:
//!
//! ```text
//!   Server:  220 fake.smtp ESMTP ready
//!   Client:  EHLO client.test
//!   Server:  250-fake.smtp
//!   Server:  250 AUTH PLAIN LOGIN
//!   Client:  AUTH PLAIN AHVzZXIAc2VjcmV0
//!   Server:  235 2.7.0 Authentication successful
//!   Client:  MAIL FROM:<alice@example.com>
//!   Client:  RCPT TO:<bob@example.com>
//!   Client:  DATA
//!   Server:  354 End data with <CR><LF>.<CR><LF>
//!   Client:  ...message...
//!   Client:  .
//!   Client:  QUIT
//! ```
//!
//! Every connection gets a [`SmtpRecord`] that is updated before each
//! reply is written, so a client that has seen a reply can rely on the
//! record reflecting the command.
//!
//! [`FakeSmtpServer::start_tls`] runs the same dialogue inside implicit
//! TLS (SMTPS) with a self-signed certificate.

use super::cert::SelfSigned;
use super::io::write_line;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// What one client connection did.
#[derive(Debug, Clone, Default)]
pub struct SmtpRecord {
    pub helo: Option<String>,
    /// `AUTH` lines plus any continuation lines, as sent.
    pub auth: Vec<String>,
    pub mail_from: Vec<String>,
    pub rcpt_to: Vec<String>,
    /// One entry per DATA transfer, dot-unstuffed, CRLF line endings.
    pub messages: Vec<String>,
    pub quit: bool,
}

pub struct FakeSmtpServer {
    port: u16,
    records: Arc<Mutex<Vec<SmtpRecord>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeSmtpServer {
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    /// Expect a TLS handshake before the greeting.
    pub async fn start_tls() -> Self {
        let acceptor = SelfSigned::generate().acceptor(None);
        Self::spawn(Some(acceptor)).await
    }

    async fn spawn(tls: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let records = Arc::new(Mutex::new(Vec::new()));

        let shared = records.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let index = {
                    let mut records = shared.lock().unwrap();
                    records.push(SmtpRecord::default());
                    records.len() - 1
                };
                let shared = shared.clone();
                let tls = tls.clone();
                tokio::spawn(async move {
                    match tls {
                        Some(acceptor) => {
                            if let Ok(stream) = acceptor.accept(stream).await {
                                handle_connection(stream, &shared, index).await;
                            }
                        }
                        None => handle_connection(stream, &shared, index).await,
                    }
                });
            }
        });

        Self {
            port,
            records,
            _handle: handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// One record per accepted connection.
    pub fn records(&self) -> Vec<SmtpRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn only_record(&self) -> SmtpRecord {
        let records = self.records();
        assert_eq!(records.len(), 1, "expected exactly one SMTP connection");
        records[0].clone()
    }
}

async fn handle_connection<S>(stream: S, records: &Mutex<Vec<SmtpRecord>>, index: usize)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let update = |f: &dyn Fn(&mut SmtpRecord)| f(&mut records.lock().unwrap()[index]);

    if write_line(&mut reader, "220 fake.smtp ESMTP ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    loop {
        let Some(line) = read_line(&mut reader).await else {
            break;
        };
        let upper = line.to_ascii_uppercase();

        let reply = if upper.starts_with("EHLO ") || upper.starts_with("HELO ") {
            let domain = line[5..].trim().to_string();
            update(&|r| r.helo = Some(domain.clone()));
            "250-fake.smtp\r\n250 AUTH PLAIN LOGIN\r\n"
        } else if upper.starts_with("AUTH PLAIN") {
            update(&|r| r.auth.push(line.clone()));
            "235 2.7.0 Authentication successful\r\n"
        } else if upper.starts_with("AUTH LOGIN") {
            update(&|r| r.auth.push(line.clone()));
            if !login_exchange(&mut reader, &update).await {
                break;
            }
            "235 2.7.0 Authentication successful\r\n"
        } else if upper.starts_with("MAIL FROM:") {
            let address = angle_address(&line);
            update(&|r| r.mail_from.push(address.clone()));
            "250 2.1.0 Ok\r\n"
        } else if upper.starts_with("RCPT TO:") {
            let address = angle_address(&line);
            update(&|r| r.rcpt_to.push(address.clone()));
            "250 2.1.5 Ok\r\n"
        } else if upper == "DATA" {
            if write_line(&mut reader, "354 End data with <CR><LF>.<CR><LF>\r\n")
                .await
                .is_err()
            {
                break;
            }
            let Some(message) = read_data(&mut reader).await else {
                break;
            };
            update(&|r| r.messages.push(message.clone()));
            "250 2.0.0 Ok: queued as FAKE1\r\n"
        } else if upper == "QUIT" {
            update(&|r| r.quit = true);
            let _ = write_line(&mut reader, "221 2.0.0 Bye\r\n").await;
            break;
        } else if upper == "RSET" || upper == "NOOP" {
            "250 2.0.0 Ok\r\n"
        } else {
            "502 5.5.2 Command not recognized\r\n"
        };

        if write_line(&mut reader, reply).await.is_err() {
            break;
        }
    }
}

/// AUTH LOGIN: prompt for user name and password, one line each.
async fn login_exchange<S: AsyncRead + AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    update: &impl Fn(&dyn Fn(&mut SmtpRecord)),
) -> bool {
    for prompt in ["334 VXNlcm5hbWU6\r\n", "334 UGFzc3dvcmQ6\r\n"] {
        if write_line(reader, prompt).await.is_err() {
            return false;
        }
        let Some(answer) = read_line(reader).await else {
            return false;
        };
        update(&|r| r.auth.push(answer.clone()));
    }
    true
}

async fn read_line<S: AsyncRead + Unpin>(reader: &mut BufReader<S>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Read a DATA payload up to the lone `.` line.
async fn read_data<S: AsyncRead + Unpin>(reader: &mut BufReader<S>) -> Option<String> {
    let mut message = String::new();
    loop {
        let line = read_line(reader).await?;
        if line == "." {
            return Some(message);
        }
        let line = line.strip_prefix('.').unwrap_or(&line);
        message.push_str(line);
        message.push_str("\r\n");
    }
}

fn angle_address(line: &str) -> String {
    line.split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(address, _)| address.to_string())
        .unwrap_or_default()
}
