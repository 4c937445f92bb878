//! Single-shot retrieval of the current-conditions document.
//!
//! [`ConditionsSource`] is the seam between the poll loop and the network,
//! so the scheduler can be exercised against scripted responses.

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error as _;
use std::fmt;
use std::time::Duration;

use crate::error::AcquisitionError;

/// Local API path serving current conditions.
pub const CURRENT_CONDITIONS_PATH: &str = "/v1/current_conditions";

/// Default HTTP port of the device.
pub const DEFAULT_PORT: u16 = 80;

/// Address of a WeatherLink Live on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
}

impl DeviceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn current_conditions_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, CURRENT_CONDITIONS_PATH)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Something that can produce one current-conditions document.
#[async_trait]
pub trait ConditionsSource: Send + Sync {
    /// Fetch and JSON-decode one response. Must return within its own timeout.
    async fn fetch(&self) -> Result<Value, AcquisitionError>;
}

// ── HTTP source ─────────────────────────────────────────────────────

/// Fetches current conditions over HTTP with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(endpoint: &DeviceEndpoint, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: endpoint.current_conditions_url(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> AcquisitionError {
        if err.is_timeout() {
            AcquisitionError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AcquisitionError::Network(error_chain(&err))
        }
    }
}

#[async_trait]
impl ConditionsSource for HttpSource {
    async fn fetch(&self) -> Result<Value, AcquisitionError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            return Err(AcquisitionError::Protocol {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Render an error with its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ── Scripted source for testing ─────────────────────────────────────
