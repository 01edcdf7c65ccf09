//! Backend reachability probe

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::io::HttpClient;

/// Outcome of one reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A lightweight reachability check. Implementations never fail; every
/// problem is reported as an unsuccessful [`ProbeResult`].
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Probe: Send + Sync {
    async fn probe(&self) -> ProbeResult;
}

/// Status-only GET against the backend; any 2xx counts as reachable
pub struct HttpProbe {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe").field("url", &self.url).finish()
    }
}

impl HttpProbe {
    pub fn new(config: &BackendConfig, http: Arc<dyn HttpClient>) -> Self {
        let url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.probe_path
        );
        tracing::debug!("Created HttpProbe for {}", url);
        Self { url, http }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> ProbeResult {
        match self.http.get(&self.url).await {
            Ok(response) if response.is_success() => ProbeResult::success(),
            Ok(response) => {
                tracing::debug!("Probe {} returned status {}", self.url, response.status);
                ProbeResult::failure(format!("Backend returned status {}", response.status))
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", self.url, e);
                ProbeResult::failure(e.to_string())
            }
        }
    }
}
