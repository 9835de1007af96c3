//! Email message value object
//!
//! A plain, mutable struct a caller fills in (directly or through a
//! builder callback) and hands to [`crate::smtp`]. Serialization to
//! RFC 5322 is left to lettre.

use crate::error::Result;
use chrono::{DateTime, Utc};
use lettre::Message;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

/// An outgoing email.
///
/// # Examples
///
/// ```
/// use net_helpers::EmailMessage;
///
/// let message = EmailMessage::new("alice@example.com", ["bob@example.com"])
///     .build(|m| {
///         m.subject = "Hello".to_string();
///         m.body = "Hi Bob".to_string();
///     });
/// assert_eq!(message.recipients(), vec!["bob@example.com"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    pub subject: String,
    /// Generated from the local hostname when absent.
    pub message_id: Option<String>,
    pub body: String,
    /// Defaults to the time of serialization.
    pub date: Option<DateTime<Utc>>,
}

impl EmailMessage {
    #[must_use]
    pub fn new<I, S>(from: impl Into<String>, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Let `builder` adjust the message before it is sent.
    #[must_use]
    pub fn build(mut self, builder: impl FnOnce(&mut Self)) -> Self {
        builder(&mut self);
        self
    }

    /// Every address the message is delivered to.
    #[must_use]
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .map(String::as_str)
            .collect()
    }

    /// Convert into a lettre [`Message`], validating every address.
    ///
    /// # Errors
    ///
    /// Returns the address parse error for a malformed mailbox, or the
    /// builder error when no recipient is set.
    pub fn to_lettre(&self) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(self.subject.as_str())
            .message_id(self.message_id.clone());

        for to in &self.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        for cc in &self.cc {
            builder = builder.cc(cc.parse::<Mailbox>()?);
        }
        builder = match self.date {
            Some(date) => builder.date(date.into()),
            None => builder.date_now(),
        };

        Ok(builder.body(self.body.clone())?)
    }

    /// The message as it goes over the wire.
    ///
    /// # Errors
    ///
    /// See [`EmailMessage::to_lettre`].
    pub fn to_wire(&self) -> Result<String> {
        let formatted = self.to_lettre()?.formatted();
        Ok(String::from_utf8_lossy(&formatted).into_owned())
    }
}
