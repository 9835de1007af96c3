//! Public IP lookup via a "checkip" page

use crate::config::HttpOptions;
use crate::error::Result;
use crate::http;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// The page queried by [`current_ip`].
pub const CHECKIP_URL: &str = "http://checkip.dyndns.org/";

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("IPv4 pattern is valid")
});

/// The first IPv4-shaped token in `body`, if any.
///
/// Only the shape is checked; octets are not range-validated.
#[must_use]
pub fn extract_ipv4(body: &str) -> Option<String> {
    IPV4_PATTERN
        .find(body)
        .map(|found| found.as_str().to_string())
}

/// Ask [`CHECKIP_URL`] for this host's public address.
///
/// Returns `Ok(None)` when the page holds no address.
///
/// # Errors
///
/// Returns the transport error.
pub async fn current_ip() -> Result<Option<String>> {
    current_ip_from(CHECKIP_URL).await
}

/// Like [`current_ip`], against another checkip-style page.
///
/// # Errors
///
/// Returns the URL or transport error.
pub async fn current_ip_from(url: &str) -> Result<Option<String>> {
    let body = http::get_body(&HttpOptions::url(url)).await?;
    let address = extract_ipv4(&body);
    debug!("checkip at {} returned {:?}", url, address);
    Ok(address)
}
