//! Fallback policy: decides when a live response is replaced by canned data

use std::fmt;

use crate::config::FallbackConfig;
use crate::io::HttpResponse;
use crate::transport::Envelope;

/// Why a live response was not used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// The request never produced a response
    Transport(String),
    /// The backend answered with a non-success status
    Status(u16),
    /// The backend answered with something other than structured data
    ContentType(Option<String>),
    /// The body could not be read as a response envelope
    Decode(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::Transport(msg) => write!(f, "transport failure: {}", msg),
            DegradedReason::Status(status) => write!(f, "status {}", status),
            DegradedReason::ContentType(Some(ct)) => write!(f, "unexpected content type '{}'", ct),
            DegradedReason::ContentType(None) => write!(f, "missing content type"),
            DegradedReason::Decode(msg) => write!(f, "malformed body: {}", msg),
        }
    }
}

/// Outcome of evaluating one live exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Live(Envelope),
    Substitute(DegradedReason),
}

/// The rule deciding when substitution happens and how loudly it is reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub expected_content_type: String,
    pub report_degraded_usage: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            expected_content_type: "application/json".to_string(),
            report_degraded_usage: false,
        }
    }
}

impl From<&FallbackConfig> for FallbackPolicy {
    fn from(config: &FallbackConfig) -> Self {
        Self {
            expected_content_type: config.expected_content_type.clone(),
            report_degraded_usage: config.report_degraded_usage,
        }
    }
}

impl FallbackPolicy {
    /// Classify a live exchange as usable or to be substituted
    pub fn evaluate(&self, outcome: &crate::Result<HttpResponse>) -> Verdict {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => return Verdict::Substitute(DegradedReason::Transport(e.to_string())),
        };

        if !response.is_success() {
            return Verdict::Substitute(DegradedReason::Status(response.status));
        }

        if !self.accepts_content_type(response.content_type.as_deref()) {
            return Verdict::Substitute(DegradedReason::ContentType(response.content_type.clone()));
        }

        match serde_json::from_str::<Envelope>(&response.body) {
            Ok(envelope) => Verdict::Live(envelope),
            Err(e) => Verdict::Substitute(DegradedReason::Decode(e.to_string())),
        }
    }

    /// Content type match ignoring parameters such as `; charset=utf-8`
    pub fn accepts_content_type(&self, content_type: Option<&str>) -> bool {
        content_type
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case(&self.expected_content_type))
            .unwrap_or(false)
    }
}
