//! REST transport.
//!
//! ApiRequest  -> method + route (or absolute href) + query + JSON body
//! ApiResponse -> status + decoded body (`None` for empty bodies)
//! Transport   -> the seam commands send through; `HttpTransport` is the
//!                reqwest implementation, tests use `mock::MockTransport`.
//!
use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

const USER_AGENT: &str = concat!("cloudctl/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("'{0}' cannot be used as a base URL")]
    NotABase(String),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status for errors the API answered with.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path segments below the configured base URL.
    Route(Vec<String>),
    /// Absolute URL, as handed out in `href` fields.
    Href(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub target: Target,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, route: Vec<String>) -> Self {
        Self {
            method,
            target: Target::Route(route),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn href(method: Method, href: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Href(href.into()),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `/a/b` for routes, the URL itself for hrefs.
    pub fn path(&self) -> String {
        match &self.target {
            Target::Route(segments) => format!("/{}", segments.join("/")),
            Target::Href(href) => href.clone(),
        }
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Token(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Token(_) => f.write_str("Token(***)"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Auth::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* HTTP                                                                       */
/* -------------------------------------------------------------------------- */

/// Blocking facade over reqwest: one current-thread runtime per transport.
pub struct HttpTransport {
    base: Url,
    auth: Auth,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    pub fn new(base: Url, auth: Auth) -> Result<Self, ApiError> {
        if base.cannot_be_a_base() {
            return Err(ApiError::NotABase(base.to_string()));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base,
            auth,
            client,
            runtime,
        })
    }

    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = match &request.target {
            Target::Route(segments) => {
                let mut url = self.base.clone();
                url.path_segments_mut()
                    .map_err(|_| ApiError::NotABase(self.base.to_string()))?
                    .pop_if_empty()
                    .extend(segments);
                url
            }
            Target::Href(href) => Url::parse(href)?,
        };
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    async fn send_async(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self.client.request(request.method.clone(), url);
        builder = match &self.auth {
            Auth::Token(token) => builder.bearer_auth(token),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Anonymous => builder,
        };
        if let Some(body) = &request.body {
            trace!(%body, "request body");
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), len = bytes.len(), "received response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&bytes)
                    .or_else(|| status.canonical_reason().map(str::to_string))
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(serde_json::from_slice(&bytes)?)
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.runtime.block_on(self.send_async(request))
    }
}

/// First human-readable message in an error body.
///
/// Handles `{"messages":[{"message":..}]}` (compute),
/// `{"errors":[{"message":..}]}` (DNS and others) and `{"message":..}`.
pub fn error_message(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let first_in = |key: &str| {
        value
            .get(key)?
            .as_array()?
            .iter()
            .find_map(|m| m.get("message")?.as_str())
            .map(str::to_string)
    };
    first_in("messages")
        .or_else(|| first_in("errors"))
        .or_else(|| value.get("message")?.as_str().map(str::to_string))
}

/* -------------------------------------------------------------------------- */
/* Test double                                                                */
/* -------------------------------------------------------------------------- */
