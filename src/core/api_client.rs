use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use reqwest::Method;

use crate::api::{ErrorBody, HealthStatus, HEALTH_PATH};
use crate::core::config::Config;
use crate::core::constants::IDENTITY_HEADER;
use crate::core::session::SessionManager;
use crate::utils::url::construct_api_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The backend answered with a non-success status
    Status,
    /// No response at all (connection refused, DNS, reset)
    Transport,
    /// The caller's cancellation token fired before the response arrived
    Cancelled,
    /// A success response whose body could not be decoded
    Decode,
}

/// Failure of a request/response call. `status` is 0 when no response arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    pub message: String,
    pub path: String,
}

impl ApiError {
    fn status(status: StatusCode, message: String, path: &str) -> Self {
        Self {
            kind: ApiErrorKind::Status,
            status: status.as_u16(),
            message,
            path: path.to_string(),
        }
    }

    fn transport(err: &reqwest::Error, path: &str) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            status: 0,
            message: err.to_string(),
            path: path.to_string(),
        }
    }

    fn cancelled(path: &str) -> Self {
        Self {
            kind: ApiErrorKind::Cancelled,
            status: 0,
            message: "request cancelled".to_string(),
            path: path.to_string(),
        }
    }

    fn decode(status: StatusCode, err: &serde_json::Error, path: &str) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            status: status.as_u16(),
            message: format!("invalid response body: {err}"),
            path: path.to_string(),
        }
    }

    /// True for connectivity failures (status 0, not cancelled).
    pub fn is_transport(&self) -> bool {
        self.kind == ApiErrorKind::Transport
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ApiErrorKind::Transport => {
                write!(f, "Backend unreachable ({}): {}", self.path, self.message)
            }
            ApiErrorKind::Cancelled => write!(f, "Request to {} was cancelled", self.path),
            _ => write!(f, "API Error {} on {}: {}", self.status, self.path, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers, applied after the identity header
    pub headers: Vec<(String, String)>,
    /// Resolve early with [`ApiErrorKind::Cancelled`] when this fires.
    /// Without a token an in-flight call cannot be abandoned.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..Default::default()
        }
    }
}

/// Retry/timeout settings read from config.
///
/// These are reported to callers but `ApiClient` does not act on them: every
/// call is a single attempt with no intrinsic deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredPolicy {
    pub max_retry: u32,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionManager>,
    declared: DeclaredPolicy,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionManager>) -> Self {
        let mut client = Self::with_client(Client::new(), &config.api_base, session);
        client.declared = DeclaredPolicy {
            max_retry: config.max_retry,
            timeout: Duration::from_millis(config.timeout_ms),
        };
        client
    }

    pub fn with_client(http: Client, base_url: &str, session: Arc<SessionManager>) -> Self {
        let defaults = Config::default();
        Self {
            http,
            base_url: base_url.to_string(),
            session,
            declared: DeclaredPolicy {
                max_retry: defaults.max_retry,
                timeout: Duration::from_millis(defaults.timeout_ms),
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn declared_policy(&self) -> DeclaredPolicy {
        self.declared
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Issue one JSON call and decode the success payload.
    ///
    /// Exactly one attempt is made. Non-success responses become
    /// [`ApiErrorKind::Status`] with the body's `detail` (or the status reason);
    /// a missing response becomes status 0.
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.http.request(method, construct_api_url(&self.base_url, path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.dispatch(builder, path, options).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<(), T>(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    /// Same contract as [`request`](Self::request), sending a multipart body as-is.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let builder = self
            .http
            .post(construct_api_url(&self.base_url, path))
            .multipart(form);
        self.dispatch(builder, path, options).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get(HEALTH_PATH).await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let mut builder = builder.header(IDENTITY_HEADER, self.session.identity());
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(path, "sending request");
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.to_vec()))
        };

        let outcome = match options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(path, "request cancelled by caller");
                        return Err(ApiError::cancelled(path));
                    }
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        };

        let (status, body) = outcome.map_err(|err| {
            warn!(path, error = %err, "request failed without a response");
            ApiError::transport(&err, path)
        })?;

        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(path, status = status.as_u16(), %message, "request rejected");
            return Err(ApiError::status(status, message, path));
        }

        decode_body(status, &body).map_err(|err| ApiError::decode(status, &err, path))
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message())
        .unwrap_or_else(|| describe_status(status))
}

fn describe_status(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, serde_json::Error> {
    if body.is_empty() || status == StatusCode::NO_CONTENT {
        return serde_json::from_slice(b"null");
    }
    serde_json::from_slice(body)
}
