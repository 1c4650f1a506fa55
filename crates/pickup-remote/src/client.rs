//! HttpPickupBackend - reqwest implementation of [`PickupBackend`].

use crate::response::interpret_response;
use async_trait::async_trait;
use pickup_core::backend::{ApiSuccess, Method};
use pickup_core::session::token::redact;
use pickup_core::{BackendError, BarcodeEndpoint, DriverCredentials, PickupBackend, TripEndpoint};
use pickup_infrastructure::{ClientConfig, TimeoutConfig};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const LOGIN_PATH: &str = "/multi-pickup/today-assignment";
const SESSION_STATUS_PATH: &str = "/multi-pickup/session-status";
const REFRESH_PATH: &str = "/multi-pickup/refresh-token";

/// Deadline applied to each kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub login: Duration,
    pub session: Duration,
    pub trip: Duration,
}

impl From<&TimeoutConfig> for Deadlines {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            login: timeouts.login(),
            session: timeouts.session(),
            trip: timeouts.trip(),
        }
    }
}

/// One request, independent of the base URL it is sent to.
struct Call<'a> {
    method: Method,
    path: String,
    bearer: Option<&'a str>,
    body: Option<Value>,
    deadline: Duration,
}

/// Talks to the pickup backend over HTTP.
///
/// Every request races its deadline and the shutdown token; whichever
/// finishes first wins and the others are dropped, which aborts the request.
/// When no connection to the primary base URL could be opened, the same
/// request is sent once to the fallback base URL. Failures after the
/// request was sent are never retried.
#[derive(Clone)]
pub struct HttpPickupBackend {
    client: Client,
    base_url: String,
    fallback_base_url: Option<String>,
    deadlines: Deadlines,
    shutdown: CancellationToken,
}

impl HttpPickupBackend {
    pub fn new(base_url: impl Into<String>, deadlines: Deadlines) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base(base_url.into()),
            fallback_base_url: None,
            deadlines,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds a backend from client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let backend = Self::new(config.base_url.clone(), Deadlines::from(&config.timeouts));
        match &config.fallback_base_url {
            Some(url) => backend.with_fallback(url.clone()),
            None => backend,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(trim_base(url.into()));
        self
    }

    /// Aborts in-flight and future requests when `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Cancels every request made through this backend and its clones.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, call: Call<'_>) -> Result<ApiSuccess, BackendError> {
        match self.send_to(&self.base_url, &call).await {
            Ok(reply) => Ok(reply),
            Err(Attempt::NotConnected(err)) => match &self.fallback_base_url {
                Some(fallback) => {
                    warn!(
                        "[Backend] {} unreachable ({}), retrying via fallback",
                        self.base_url, err
                    );
                    self.send_to(fallback, &call).await.map_err(Attempt::into_error)
                }
                None => Err(err),
            },
            Err(Attempt::Failed(err)) => Err(err),
        }
    }

    async fn send_to(&self, base: &str, call: &Call<'_>) -> Result<ApiSuccess, Attempt> {
        let url = format!("{}{}", base, call.path);
        debug!("[Backend] {} {}", call.method, url);

        let mut request = match call.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header("Accept", "application/json");
        if let Some(token) = call.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await.map_err(Attempt::from_send)?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Attempt::Failed(classify(e)))?;
            debug!("[Backend] {} -> HTTP {}", call.path, status);
            interpret_response(status, &body).map_err(Attempt::Failed)
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("[Backend] {} cancelled", call.path);
                Err(Attempt::Failed(BackendError::Cancelled))
            }
            _ = tokio::time::sleep(call.deadline) => {
                warn!("[Backend] {} timed out after {:?}", call.path, call.deadline);
                Err(Attempt::Failed(BackendError::Timeout {
                    timeout_secs: call.deadline.as_secs(),
                }))
            }
            result = exchange => result,
        }
    }
}

/// Failure of one attempt against one base URL.
///
/// Only `NotConnected` may be retried elsewhere: the request never left this
/// host. Anything later may already have been processed by the server.
#[derive(Debug)]
enum Attempt {
    NotConnected(BackendError),
    Failed(BackendError),
}

impl Attempt {
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::NotConnected(BackendError::Unreachable(e.to_string()))
        } else {
            Self::Failed(classify(e))
        }
    }

    fn into_error(self) -> BackendError {
        match self {
            Self::NotConnected(err) | Self::Failed(err) => err,
        }
    }
}

#[async_trait]
impl PickupBackend for HttpPickupBackend {
    async fn today_assignment(
        &self,
        credentials: &DriverCredentials,
    ) -> Result<ApiSuccess, BackendError> {
        self.send(Call {
            method: Method::Post,
            path: LOGIN_PATH.to_string(),
            bearer: None,
            body: Some(credentials.to_body()),
            deadline: self.deadlines.login,
        })
        .await
    }

    async fn session_status(&self, token: &str) -> Result<ApiSuccess, BackendError> {
        debug!("[Backend] Session status for token {}", redact(token));
        self.send(Call {
            method: Method::Get,
            path: SESSION_STATUS_PATH.to_string(),
            bearer: Some(token),
            body: None,
            deadline: self.deadlines.session,
        })
        .await
    }

    async fn refresh_token(&self, token: &str) -> Result<ApiSuccess, BackendError> {
        debug!("[Backend] Refreshing token {}", redact(token));
        self.send(Call {
            method: Method::Post,
            path: REFRESH_PATH.to_string(),
            bearer: Some(token),
            body: None,
            deadline: self.deadlines.session,
        })
        .await
    }

    async fn trip_call(
        &self,
        token: &str,
        endpoint: TripEndpoint,
        body: Value,
    ) -> Result<ApiSuccess, BackendError> {
        let method = endpoint.method();
        let body = match method {
            Method::Post if !body.is_null() => Some(body),
            _ => None,
        };
        self.send(Call {
            method,
            path: endpoint.path(),
            bearer: Some(token),
            body,
            deadline: self.deadlines.trip,
        })
        .await
    }

    async fn barcode_call(
        &self,
        token: &str,
        endpoint: &BarcodeEndpoint,
        body: Value,
    ) -> Result<ApiSuccess, BackendError> {
        let method = endpoint.method();
        let body = match method {
            Method::Post => Some(body),
            Method::Get => None,
        };
        self.send(Call {
            method,
            path: endpoint.path(),
            bearer: Some(token),
            body,
            deadline: self.deadlines.trip,
        })
        .await
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Transport failures. Deadlines are enforced by the caller, so a reqwest
/// timeout only shows up if the client carries its own.
fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout { timeout_secs: 0 }
    } else {
        BackendError::Unreachable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlines_from_config() {
        let deadlines = Deadlines::from(&TimeoutConfig::default());
        assert_eq!(deadlines.login, Duration::from_secs(30));
        assert_eq!(deadlines.session, Duration::from_secs(10));
        assert_eq!(deadlines.trip, Duration::from_secs(15));
    }

    #[test]
    fn test_from_config_trims_urls() {
        let config = ClientConfig {
            base_url: "http://primary.local/api/ ".to_string(),
            fallback_base_url: Some("http://fallback.local/api/".to_string()),
            ..ClientConfig::default()
        };
        let backend = HttpPickupBackend::from_config(&config);
        assert_eq!(backend.base_url(), "http://primary.local/api");
        assert_eq!(
            backend.fallback_base_url.as_deref(),
            Some("http://fallback.local/api")
        );
    }
}
