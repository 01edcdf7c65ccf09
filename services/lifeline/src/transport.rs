//! Transport interceptor: live exchange with canned-data substitution
//!
//! [`FallbackTransport::execute`] always yields a well-formed response
//! envelope. Transport errors, non-success statuses, foreign content types and
//! malformed bodies are replaced by the registry's payload for the request's
//! operation, or by a generic `{success: true, data: null}` payload when the
//! registry has none. Substituted envelopes have the same shape as live ones.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LifelineError;
use crate::io::{HttpClient, HttpRequest};
use crate::monitor::ConnectivityMonitor;
use crate::operation::OperationKey;
use crate::policy::{DegradedReason, FallbackPolicy, Verdict};
use crate::registry::FallbackRegistry;

/// Success envelope shared by live and synthesized responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub result: EnvelopeResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeResult {
    pub data: Value,
}

impl Envelope {
    pub fn new(data: Value) -> Self {
        Self {
            result: EnvelopeResult { data },
        }
    }

    /// Payload used when no fixture matches the operation
    pub fn generic() -> Self {
        Self::new(serde_json::json!({ "success": true, "data": null }))
    }

    pub fn data(&self) -> &Value {
        &self.result.data
    }

    pub fn into_data(self) -> Value {
        self.result.data
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(self, key: &OperationKey) -> crate::Result<T> {
        serde_json::from_value(self.result.data)
            .map_err(|e| LifelineError::Decode(format!("Response for '{}': {}", key, e)))
    }
}

/// Where a delivered envelope came from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Live,
    Fallback(DegradedReason),
}

/// Result of one intercepted exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub envelope: Envelope,
    pub source: Source,
}

impl Delivery {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, Source::Fallback(_))
    }
}

/// Wraps the raw HTTP client and substitutes canned data on failure
pub struct FallbackTransport {
    http: Arc<dyn HttpClient>,
    registry: Arc<FallbackRegistry>,
    policy: FallbackPolicy,
    monitor: Option<Arc<ConnectivityMonitor>>,
}

impl std::fmt::Debug for FallbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackTransport")
            .field("policy", &self.policy)
            .field("fixtures", &self.registry.len())
            .finish()
    }
}

impl FallbackTransport {
    pub fn new(
        http: Arc<dyn HttpClient>,
        registry: Arc<FallbackRegistry>,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            http,
            registry,
            policy,
            monitor: None,
        }
    }

    /// Ask `monitor` for an immediate probe whenever a live exchange fails
    pub fn with_monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Perform one exchange. Never fails.
    pub async fn execute(&self, request: &HttpRequest) -> Delivery {
        let outcome = self.http.send(request).await;
        match self.policy.evaluate(&outcome) {
            Verdict::Live(envelope) => Delivery {
                envelope,
                source: Source::Live,
            },
            Verdict::Substitute(reason) => {
                let key = OperationKey::from_url(&request.url);
                self.report_failure();
                let envelope = self.substitute(key.as_ref(), &reason);
                Delivery {
                    envelope,
                    source: Source::Fallback(reason),
                }
            }
        }
    }

    /// Perform one exchange without substitution; failures are returned
    pub async fn execute_strict(&self, request: &HttpRequest) -> crate::Result<Envelope> {
        let outcome = self.http.send(request).await;
        let body = outcome.as_ref().ok().map(|r| r.body.clone());
        match self.policy.evaluate(&outcome) {
            Verdict::Live(envelope) => Ok(envelope),
            Verdict::Substitute(reason) => {
                self.report_failure();
                Err(strict_error(reason, body.as_deref()))
            }
        }
    }

    fn substitute(&self, key: Option<&OperationKey>, reason: &DegradedReason) -> Envelope {
        let fixture = key.and_then(|k| self.registry.lookup(k));
        let operation = key.map(OperationKey::as_str).unwrap_or("<unknown>");

        if self.policy.report_degraded_usage {
            tracing::warn!(
                "Serving fallback data for '{}' ({}, fixture={})",
                operation,
                reason,
                fixture.is_some()
            );
        } else {
            tracing::debug!(
                "Serving fallback data for '{}' ({}, fixture={})",
                operation,
                reason,
                fixture.is_some()
            );
        }

        match fixture {
            Some(payload) => Envelope::new(payload.clone()),
            None => Envelope::generic(),
        }
    }

    fn report_failure(&self) {
        if let Some(monitor) = &self.monitor {
            monitor.request_probe();
        }
    }
}

fn strict_error(reason: DegradedReason, body: Option<&str>) -> LifelineError {
    match reason {
        DegradedReason::Transport(msg) => LifelineError::Http(msg),
        DegradedReason::Status(status) => {
            let message = body
                .and_then(backend_error_message)
                .unwrap_or_else(|| format!("Backend returned status {}", status));
            LifelineError::Http(message)
        }
        reason @ (DegradedReason::ContentType(_) | DegradedReason::Decode(_)) => {
            LifelineError::Decode(reason.to_string())
        }
    }
}

/// Extract `error.message` from an error envelope
fn backend_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Typed RPC calls against `{base_url}/api/<operation>`
#[derive(Debug)]
pub struct RpcClient {
    base_url: String,
    transport: Arc<FallbackTransport>,
}

impl RpcClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<FallbackTransport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
        }
    }

    pub fn url_for(&self, key: &OperationKey) -> String {
        format!("{}/api/{}", self.base_url, key)
    }

    /// Read call; failures resolve to fallback data inside the transport
    pub async fn query<T: DeserializeOwned>(
        &self,
        key: impl Into<OperationKey>,
        input: Option<&Value>,
    ) -> crate::Result<T> {
        let key = key.into();
        let url = match input {
            Some(input) => {
                let encoded = serde_json::to_string(input)?;
                reqwest::Url::parse_with_params(&self.url_for(&key), &[("input", encoded)])
                    .map_err(|e| LifelineError::Config(format!("Invalid RPC URL: {}", e)))?
                    .to_string()
            }
            None => self.url_for(&key),
        };

        let delivery = self.transport.execute(&HttpRequest::get(url)).await;
        delivery.envelope.decode(&key)
    }

    /// Write call; failures are returned, never substituted
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        key: impl Into<OperationKey>,
        input: &Value,
    ) -> crate::Result<T> {
        let key = key.into();
        let request = HttpRequest::post_json(self.url_for(&key), serde_json::to_string(input)?);
        let envelope = self.transport.execute_strict(&request).await?;
        envelope.decode(&key)
    }
}
