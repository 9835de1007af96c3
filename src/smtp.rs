//! SMTP sessions and message submission
//!
//! Connection setup, greeting, AUTH and the mail transaction are all
//! handled by lettre's `AsyncSmtpConnection`; this module only maps
//! [`SmtpOptions`] onto it and scopes the session.

use crate::config::SmtpOptions;
use crate::error::{Error, Result};
use crate::message::EmailMessage;
use crate::session::{Release, scoped};
use crate::verify::{self, CertVerification};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Response;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Domain announced in the greeting when none is configured.
pub const DEFAULT_HELO: &str = "localhost";

/// SMTP AUTH mechanism.
///
/// # Examples
///
/// ```
/// use net_helpers::AuthMechanism;
///
/// assert_eq!("cram_md5".parse::<AuthMechanism>().unwrap(), AuthMechanism::CramMd5);
/// assert_eq!(AuthMechanism::Login.as_smtp_str(), "LOGIN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    Login,
    Plain,
    /// Recognized, but the SMTP delegate cannot perform it.
    CramMd5,
}

impl AuthMechanism {
    /// The mechanism name as used in `AUTH` commands.
    #[must_use]
    pub const fn as_smtp_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Plain => "PLAIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }

    fn to_lettre(self) -> Result<Mechanism> {
        match self {
            Self::Login => Ok(Mechanism::Login),
            Self::Plain => Ok(Mechanism::Plain),
            Self::CramMd5 => Err(Error::UnsupportedAuth(self)),
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_smtp_str())
    }
}

impl FromStr for AuthMechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "login" => Ok(Self::Login),
            "plain" => Ok(Self::Plain),
            "cram_md5" => Ok(Self::CramMd5),
            other => Err(Error::Config(format!("Unknown auth mechanism: {other}"))),
        }
    }
}

/// An open, possibly authenticated, SMTP session.
pub struct SmtpSession {
    connection: AsyncSmtpConnection,
    host: String,
}

impl SmtpSession {
    /// Submit `message` to all of its recipients.
    ///
    /// Returns the first line of the server's final reply.
    ///
    /// # Errors
    ///
    /// Returns address/message validation errors or the SMTP error as
    /// reported by the server.
    pub async fn send(&mut self, message: &EmailMessage) -> Result<String> {
        let message = message.to_lettre()?;
        debug!(
            "Sending message to {} recipient(s) via {}",
            message.envelope().to().len(),
            self.host
        );

        let response = self
            .connection
            .send(message.envelope(), &message.formatted())
            .await?;
        Ok(reply_text(&response))
    }

    /// The underlying lettre connection, for commands not wrapped here.
    pub const fn connection(&mut self) -> &mut AsyncSmtpConnection {
        &mut self.connection
    }
}

impl Release for SmtpSession {
    async fn release(&mut self) -> Result<()> {
        if self.connection.has_broken() {
            self.connection.abort().await;
            return Ok(());
        }
        self.connection.quit().await?;
        Ok(())
    }
}

/// Open an SMTP session to `host` and authenticate when credentials are
/// configured.
///
/// # Errors
///
/// Returns [`Error::UnsupportedAuth`] before any I/O for CRAM-MD5,
/// [`Error::Config`] when only one of `user` and `password` is set, and
/// otherwise the connection, TLS or AUTH error from lettre.
pub async fn connect(host: &str, options: &SmtpOptions) -> Result<SmtpSession> {
    let credentials = match (&options.user, &options.password) {
        (Some(user), Some(password)) => {
            let mechanism = options.auth.unwrap_or(AuthMechanism::Plain).to_lettre()?;
            Some((mechanism, Credentials::new(user.clone(), password.clone())))
        }
        (None, None) => None,
        _ => {
            return Err(Error::Config("SMTP user and password must be given together".into()));
        }
    };

    let port = options.resolved_port();
    let hello = ClientId::Domain(
        options
            .helo
            .clone()
            .unwrap_or_else(|| DEFAULT_HELO.to_string()),
    );
    let tls = if options.tls {
        let accept_any = verify::resolve(options.verify) == CertVerification::AcceptAny;
        Some(
            TlsParameters::builder(host.to_string())
                .dangerous_accept_invalid_certs(accept_any)
                .build_rustls()?,
        )
    } else {
        None
    };

    debug!("Connecting to SMTP server at {}:{}", host, port);
    let mut connection =
        AsyncSmtpConnection::connect_tokio1((host, port), None, &hello, tls, None).await?;

    if let Some((mechanism, credentials)) = credentials {
        connection.auth(&[mechanism], &credentials).await?;
        debug!("Authenticated with {}", mechanism);
    }

    info!("Connected to SMTP server {}:{}", host, port);
    Ok(SmtpSession {
        connection,
        host: host.to_string(),
    })
}

/// Connect, run `body`, then QUIT.
///
/// # Errors
///
/// Returns connect errors, the body's error, or the QUIT error.
pub async fn session<T, F>(host: &str, options: &SmtpOptions, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut SmtpSession) -> Result<T>,
{
    let session = connect(host, options).await?;
    scoped(session, body).await
}

/// Let `builder` finish `message`, then send it in its own session.
///
/// # Errors
///
/// The message is validated before connecting; see [`connect`] and
/// [`SmtpSession::send`] for the rest.
pub async fn send_message(
    host: &str,
    options: &SmtpOptions,
    message: EmailMessage,
    builder: impl FnOnce(&mut EmailMessage),
) -> Result<String> {
    let message = message.build(builder);
    message.to_lettre()?;

    session(host, options, async |session: &mut SmtpSession| {
        session.send(&message).await
    })
    .await
}

fn reply_text(response: &Response) -> String {
    response.first_line().unwrap_or_default().to_string()
}
