//! HTTP requests driven by [`HttpOptions`]
//!
//! Options are expanded into a URL plus transport settings, turned into
//! a `reqwest::Client`, and every verb helper issues exactly one
//! request through it. Framing, TLS and proxying belong to reqwest.

use crate::config::{HttpOptions, ProxyOptions};
use crate::error::{Error, Result};
use crate::session::{Release, scoped};
use crate::verify::{self, CertVerification, VerifyMode};
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response};
use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Verbs with a dedicated helper in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Put,
    Delete,
    Options,
    Trace,
    Lock,
    Unlock,
    MkCol,
    Move,
    Copy,
    PropFind,
    PropPatch,
}

impl HttpMethod {
    pub const ALL: [Self; 14] = [
        Self::Get,
        Self::Post,
        Self::Head,
        Self::Put,
        Self::Delete,
        Self::Options,
        Self::Trace,
        Self::Lock,
        Self::Unlock,
        Self::MkCol,
        Self::Move,
        Self::Copy,
        Self::PropFind,
        Self::PropPatch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::MkCol => "MKCOL",
            Self::Move => "MOVE",
            Self::Copy => "COPY",
            Self::PropFind => "PROPFIND",
            Self::PropPatch => "PROPPATCH",
        }
    }

    /// The reqwest method for this verb.
    ///
    /// # Errors
    ///
    /// Never fails for the fixed verb names; the `Result` comes from
    /// reqwest's extension-method constructor.
    pub fn method(self) -> Result<Method> {
        parse_method(self.as_str())
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == upper)
            .ok_or_else(|| Error::Config(format!("Unknown HTTP method: {s}")))
    }
}

/// Canonical connection settings derived from [`HttpOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedOptions {
    pub url: Url,
    /// True when the final scheme is `https`.
    pub ssl: bool,
    pub verify: Option<VerifyMode>,
    pub proxy: Option<ProxyOptions>,
    /// Basic auth user and optional password.
    pub credentials: Option<(String, Option<String>)>,
}

/// Resolve a URL, or discrete host/port/path fields, into one URL.
///
/// # Errors
///
/// Fails when neither `url` nor `host` is set, or the result does not
/// parse as a URL.
pub fn expand_options(options: &HttpOptions) -> Result<ExpandedOptions> {
    let mut url = match (&options.url, &options.host) {
        (Some(url), _) => Url::parse(url)?,
        (None, Some(host)) => {
            let scheme = if options.ssl { "https" } else { "http" };
            let port = options
                .port
                .unwrap_or(if options.ssl { 443 } else { 80 });
            let path = options.path.as_deref().unwrap_or("/");
            let separator = if path.starts_with('/') { "" } else { "/" };
            let host = url_host(host);
            Url::parse(&format!("{scheme}://{host}:{port}{separator}{path}"))?
        }
        (None, None) => {
            return Err(Error::Config("either url or host is required".into()));
        }
    };

    if !options.query.is_empty() {
        url.query_pairs_mut().extend_pairs(&options.query);
    }

    Ok(ExpandedOptions {
        ssl: url.scheme() == "https",
        url,
        verify: options.verify,
        proxy: options.proxy.clone(),
        credentials: options
            .user
            .clone()
            .map(|user| (user, options.password.clone())),
    })
}

/// IPv6 literals need brackets inside a URL authority.
fn url_host(host: &str) -> Cow<'_, str> {
    if host.parse::<Ipv6Addr>().is_ok() {
        Cow::Owned(format!("[{host}]"))
    } else {
        Cow::Borrowed(host)
    }
}

/// A configured HTTP client bound to one expanded target.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    expanded: ExpandedOptions,
}

impl HttpSession {
    #[must_use]
    pub const fn expanded(&self) -> &ExpandedOptions {
        &self.expanded
    }

    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Build a request against the session's URL.
    ///
    /// Applies the caller's headers, basic auth, and either the raw body
    /// or the urlencoded form data.
    #[must_use]
    pub fn request_builder(&self, method: Method, options: &HttpOptions) -> RequestBuilder {
        let mut request = self.client.request(method, self.expanded.url.clone());

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some((user, password)) = &self.expanded.credentials {
            request = request.basic_auth(user, password.as_deref());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        } else if !options.form_data.is_empty() {
            request = request.form(&options.form_data);
        }
        request
    }
}

impl Release for HttpSession {
    async fn release(&mut self) -> Result<()> {
        // Pooled connections close when the client is dropped.
        debug!("Finished HTTP session for {}", self.expanded.url);
        Ok(())
    }
}

/// Build the HTTP client for `options`.
///
/// Redirects are not followed and only an explicitly configured proxy is
/// used. Certificate checks follow [`crate::verify`] for `https` URLs.
///
/// # Errors
///
/// Returns option expansion errors, a bad `local_host`, or the client
/// builder error.
pub fn connect(options: &HttpOptions) -> Result<HttpSession> {
    let expanded = expand_options(options)?;
    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

    builder = match &expanded.proxy {
        Some(proxy) => {
            let proxy_url = format!("http://{}:{}", url_host(&proxy.host), proxy.port);
            let mut proxy_config = reqwest::Proxy::all(proxy_url)?;
            if let Some(user) = &proxy.user {
                proxy_config =
                    proxy_config.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
            }
            builder.proxy(proxy_config)
        }
        None => builder.no_proxy(),
    };

    if let Some(local) = &options.local_host {
        let addr = local
            .parse::<IpAddr>()
            .map_err(|e| Error::Config(format!("Invalid local_host {local}: {e}")))?;
        builder = builder.local_address(addr);
    }

    if expanded.ssl && verify::resolve(expanded.verify) == CertVerification::AcceptAny {
        builder = builder.danger_accept_invalid_certs(true);
    }

    debug!("Opened HTTP session for {}", expanded.url);
    Ok(HttpSession {
        client: builder.build()?,
        expanded,
    })
}

/// Open a session, run `body`, then finish the session.
///
/// The body reaches the expanded options through
/// [`HttpSession::expanded`].
///
/// # Errors
///
/// Returns connect errors or the body's error.
pub async fn session<T, F>(options: &HttpOptions, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut HttpSession) -> Result<T>,
{
    scoped(connect(options)?, body).await
}

/// Issue one request with `options.method` (default `GET`).
///
/// `customize` may adjust the request before it is sent.
///
/// # Errors
///
/// Returns a bad method name or the transport error.
pub async fn request(
    options: &HttpOptions,
    customize: impl FnOnce(RequestBuilder) -> RequestBuilder,
) -> Result<Response> {
    let method = method_or(options, HttpMethod::Get)?;
    send_with(options, method, customize).await
}

async fn send_with(
    options: &HttpOptions,
    method: Method,
    customize: impl FnOnce(RequestBuilder) -> RequestBuilder,
) -> Result<Response> {
    session(options, async move |session: &mut HttpSession| -> Result<Response> {
        debug!("{} {}", method, session.expanded().url);
        let request = customize(session.request_builder(method, options));
        Ok(request.send().await?)
    })
    .await
}

async fn send_verb(options: &HttpOptions, verb: HttpMethod) -> Result<Response> {
    send_with(options, verb.method()?, |request| request).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn get(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Get).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn post(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Post).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn head(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Head).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn put(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Put).await
}

/// DELETE with `Depth: Infinity` unless the caller sets a depth.
///
/// # Errors
///
/// Returns the transport error.
pub async fn delete(options: &HttpOptions) -> Result<Response> {
    send_verb(&with_depth(options, "Infinity"), HttpMethod::Delete).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn options(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Options).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn trace(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Trace).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn lock(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Lock).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn unlock(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Unlock).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn mkcol(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::MkCol).await
}

/// WebDAV MOVE.
///
/// # Errors
///
/// Returns the transport error.
pub async fn move_resource(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Move).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn copy(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::Copy).await
}

/// PROPFIND with `Depth: 0` unless the caller sets a depth.
///
/// # Errors
///
/// Returns the transport error.
pub async fn propfind(options: &HttpOptions) -> Result<Response> {
    send_verb(&with_depth(options, "0"), HttpMethod::PropFind).await
}

/// # Errors
///
/// Returns the transport error.
pub async fn proppatch(options: &HttpOptions) -> Result<Response> {
    send_verb(options, HttpMethod::PropPatch).await
}

/// Response headers of a GET.
///
/// # Errors
///
/// Returns the transport error.
pub async fn get_headers(options: &HttpOptions) -> Result<HeaderMap> {
    Ok(get(options).await?.headers().clone())
}

/// Response body of a GET.
///
/// # Errors
///
/// Returns the transport or body decoding error.
pub async fn get_body(options: &HttpOptions) -> Result<String> {
    Ok(get(options).await?.text().await?)
}

/// Response headers of a POST.
///
/// # Errors
///
/// Returns the transport error.
pub async fn post_headers(options: &HttpOptions) -> Result<HeaderMap> {
    Ok(post(options).await?.headers().clone())
}

/// Response body of a POST.
///
/// # Errors
///
/// Returns the transport or body decoding error.
pub async fn post_body(options: &HttpOptions) -> Result<String> {
    Ok(post(options).await?.text().await?)
}

/// Status code of a HEAD request, or of `options.method` when set.
///
/// # Errors
///
/// Returns the transport error; it is never folded into a status.
pub async fn status(options: &HttpOptions) -> Result<u16> {
    let method = method_or(options, HttpMethod::Head)?;
    let response = send_with(options, method, |request| request).await?;
    Ok(response.status().as_u16())
}

/// Whether [`status`] is exactly 200.
///
/// # Errors
///
/// Returns the transport error.
pub async fn is_ok(options: &HttpOptions) -> Result<bool> {
    Ok(status(options).await? == 200)
}

/// The `Server` header of a HEAD request.
///
/// # Errors
///
/// Returns the transport error.
pub async fn server_header(options: &HttpOptions) -> Result<Option<String>> {
    response_header(options, HttpMethod::Head, "server").await
}

/// The `X-Powered-By` header of a GET request.
///
/// # Errors
///
/// Returns the transport error.
pub async fn powered_by_header(options: &HttpOptions) -> Result<Option<String>> {
    response_header(options, HttpMethod::Get, "x-powered-by").await
}

async fn response_header(
    options: &HttpOptions,
    default: HttpMethod,
    name: &str,
) -> Result<Option<String>> {
    let method = method_or(options, default)?;
    let response = send_with(options, method, |request| request).await?;
    Ok(response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string))
}

fn method_or(options: &HttpOptions, default: HttpMethod) -> Result<Method> {
    options
        .method
        .as_deref()
        .map_or_else(|| default.method(), parse_method)
}

fn parse_method(name: &str) -> Result<Method> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::Config(format!("Invalid HTTP method {name}: {e}")))
}

/// Add a `Depth` header unless the caller already supplied one.
fn with_depth(options: &HttpOptions, depth: &str) -> HttpOptions {
    let mut options = options.clone();
    if !options
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("depth"))
    {
        options.headers.insert("Depth".to_string(), depth.to_string());
    }
    options
}
