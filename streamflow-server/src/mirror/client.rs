//! Mirror race client.
//!
//! Sends one logical request to every configured mirror at once and takes
//! the first usable answer. Each mirror gets its own timeout; a slow or
//! broken mirror only ever costs its own request.

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{MirrorError, MirrorFailure, RaceError};
use super::race::first_success;

/// Public radio-browser API mirrors.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://de1.api.radio-browser.info/json",
    "https://nl1.api.radio-browser.info/json",
    "https://at1.api.radio-browser.info/json",
    "https://de2.api.radio-browser.info/json",
];

/// Default per-mirror timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration for the mirror race.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Mirror base URLs, e.g. `https://de1.api.radio-browser.info/json`
    pub mirrors: Vec<String>,
    /// Time budget for each individual mirror request
    pub timeout: Duration,
}

impl MirrorConfig {
    /// Create a config for the given mirrors with the default timeout.
    pub fn new<S: Into<String>>(mirrors: impl IntoIterator<Item = S>) -> Self {
        Self {
            mirrors: mirrors.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-mirror timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIRRORS.iter().copied())
    }
}

/// Whether `segment` survives as its own path segment.
///
/// Empty, `.` and `..` segments are removed or resolved when the URL is
/// built, so a request for them would hit a different resource.
pub fn is_path_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
}

/// A request relative to a mirror base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl MirrorRequest {
    /// Create a request for the given path segments.
    ///
    /// Segments are percent-encoded individually, so a segment containing
    /// `/` stays a single segment.
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// The path portion, e.g. `bytag/jazz`.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Build the full URL against a mirror base.
    ///
    /// The `?` is only present when there are query parameters.
    pub fn url_for(&self, base: &str) -> Result<Url, MirrorError> {
        if let Some(segment) = self.segments.iter().find(|s| !is_path_segment(s)) {
            return Err(MirrorError::InvalidSegment {
                segment: segment.clone(),
            });
        }

        let invalid = || MirrorError::InvalidUrl {
            url: base.to_string(),
        };

        let mut url = Url::parse(base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(&self.segments);

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }
}

/// HTTP seam for fetching JSON from one mirror.
///
/// Implementations report success only for a 2xx response with a JSON body.
/// Timeouts are applied by [`MirrorRace`], not by the transport.
pub trait MirrorTransport: Send + Sync {
    fn get_json(&self, url: Url) -> impl Future<Output = Result<Value, MirrorError>> + Send;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport that asks for JSON responses.
    pub fn new() -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self { http })
    }
}

impl MirrorTransport for ReqwestTransport {
    async fn get_json(&self, url: Url) -> Result<Value, MirrorError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(MirrorError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;

        serde_json::from_slice(&body).map_err(|e| MirrorError::BadBody {
            message: e.to_string(),
        })
    }
}

/// Races requests across a fixed set of mirrors.
#[derive(Debug, Clone)]
pub struct MirrorRace<T> {
    transport: T,
    config: MirrorConfig,
}

impl<T: MirrorTransport> MirrorRace<T> {
    /// Create a race over the configured mirrors.
    pub fn new(transport: T, config: MirrorConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch a JSON payload from whichever mirror answers successfully first.
    ///
    /// Fails with [`RaceError::NoMirrorsConfigured`] when the mirror list is
    /// empty and with [`RaceError::AllMirrorsFailed`] only once every mirror
    /// has failed or timed out.
    pub async fn race_fetch(&self, request: &MirrorRequest) -> Result<Value, RaceError> {
        if self.config.mirrors.is_empty() {
            return Err(RaceError::NoMirrorsConfigured);
        }

        let attempts = self
            .config
            .mirrors
            .iter()
            .map(|mirror| self.fetch_one(mirror, request));

        first_success(attempts).await.map_err(|failures| {
            warn!(
                path = %request.path(),
                mirrors = failures.len(),
                "All mirrors failed"
            );
            RaceError::AllMirrorsFailed { failures }
        })
    }

    async fn fetch_one(
        &self,
        mirror: &str,
        request: &MirrorRequest,
    ) -> Result<Value, MirrorFailure> {
        let result = match request.url_for(mirror) {
            Ok(url) => {
                let timeout = self.config.timeout;
                tokio::time::timeout(timeout, self.transport.get_json(url))
                    .await
                    .unwrap_or(Err(MirrorError::Timeout(timeout)))
            }
            Err(e) => Err(e),
        };

        result.map_err(|error| {
            debug!(
                mirror = %mirror,
                path = %request.path(),
                error = %error,
                "Mirror request failed"
            );
            MirrorFailure {
                mirror: mirror.to_string(),
                error,
            }
        })
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
