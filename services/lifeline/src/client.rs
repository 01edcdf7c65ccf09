//! Resilient query/mutation façade used by application code
//!
//! Every call first consults the connectivity monitor. In degraded mode
//! queries resolve from the fallback registry and mutations are simulated;
//! nothing touches the network. In healthy mode the live function runs, with
//! the registry as a second chance for failed queries. Failed mutations are
//! never masked: they are alerted through the [`Notifier`] and returned.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::LifelineError;
use crate::monitor::ConnectivityMonitor;
use crate::notifier::{LogNotifier, Notification, Notifier};
use crate::operation::OperationKey;
use crate::registry::FallbackRegistry;

/// Per-call query outcome held by the calling binding
#[derive(Debug)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub error: Option<LifelineError>,
    /// Set only while a fetch is in flight; cleared even if it is abandoned
    pub is_loading: bool,
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
        }
    }
}

/// Entry point binding monitor state to per-call behaviour
#[derive(Clone)]
pub struct ResilientClient {
    monitor: Arc<ConnectivityMonitor>,
    registry: Arc<FallbackRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("health", &self.monitor.health())
            .field("fixtures", &self.registry.len())
            .field("notifier", &self.notifier.type_name())
            .finish()
    }
}

impl ResilientClient {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        registry: Arc<FallbackRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            monitor,
            registry,
            notifier,
        }
    }

    /// Client alerting through the log
    pub fn with_log_notifier(
        monitor: Arc<ConnectivityMonitor>,
        registry: Arc<FallbackRegistry>,
    ) -> Self {
        Self::new(monitor, registry, Arc::new(LogNotifier))
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn registry(&self) -> &Arc<FallbackRegistry> {
        &self.registry
    }

    /// Bind a read operation. Nothing runs until [`Query::fetch`].
    pub fn query<T, F, Fut>(
        &self,
        key: impl Into<OperationKey>,
        fetch_live: F,
        default: Option<T>,
    ) -> Query<T, F>
    where
        T: DeserializeOwned + Clone,
        F: Fn() -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        Query {
            key: key.into(),
            client: self.clone(),
            fetch_live,
            default,
            result: QueryResult::default(),
        }
    }

    /// Bind a write operation
    pub fn mutation<T, V, F, Fut>(
        &self,
        key: impl Into<OperationKey>,
        mutate: F,
        options: MutationOptions<T>,
    ) -> Mutation<T, V, F>
    where
        T: DeserializeOwned + Clone,
        F: Fn(V) -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        Mutation {
            key: key.into(),
            client: self.clone(),
            mutate,
            options,
            is_loading: false,
            error: None,
            _vars: PhantomData,
        }
    }

    fn fixture<T: DeserializeOwned>(&self, key: &OperationKey) -> Option<crate::Result<T>> {
        self.registry.lookup_as(key)
    }
}

/// A bound query; each [`fetch`](Query::fetch) decides afresh from current
/// monitor state
pub struct Query<T, F> {
    key: OperationKey,
    client: ResilientClient,
    fetch_live: F,
    default: Option<T>,
    result: QueryResult<T>,
}

impl<T, F, Fut> Query<T, F>
where
    T: DeserializeOwned + Clone,
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    pub fn result(&self) -> &QueryResult<T> {
        &self.result
    }

    /// Run the decision process and store the outcome. If the returned
    /// future is dropped early the previous result is kept and `is_loading`
    /// is cleared.
    pub async fn fetch(&mut self) -> &QueryResult<T> {
        let outcome = {
            let _loading = LoadingFlag::raise(&mut self.result.is_loading);
            resolve_query(
                &self.key,
                &self.client,
                &self.fetch_live,
                self.default.as_ref(),
            )
            .await
        };
        self.result = match outcome {
            Ok(data) => QueryResult {
                data: Some(data),
                error: None,
                is_loading: false,
            },
            Err(error) => QueryResult {
                data: None,
                error: Some(error),
                is_loading: false,
            },
        };
        &self.result
    }

    /// Same as [`fetch`](Query::fetch); nothing is cached between calls
    pub async fn refetch(&mut self) -> &QueryResult<T> {
        self.fetch().await
    }

}

/// Sets a loading flag for the lifetime of an in-flight call
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

async fn resolve_query<T, F, Fut>(
    key: &OperationKey,
    client: &ResilientClient,
    fetch_live: &F,
    default: Option<&T>,
) -> crate::Result<T>
where
    T: DeserializeOwned + Clone,
    F: Fn() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    if client.monitor.state().is_degraded() {
        tracing::debug!("Query '{}' served in degraded mode", key);
        return degraded_query(key, client, default);
    }

    match fetch_live().await {
        Ok(data) => Ok(data),
        Err(e) => {
            tracing::warn!("Live query '{}' failed: {}", key, e);
            match client.fixture(key) {
                Some(Ok(data)) => {
                    tracing::debug!("Query '{}' recovered from fallback data", key);
                    Ok(data)
                }
                Some(Err(mismatch)) => {
                    tracing::warn!("Ignoring unusable fallback data: {}", mismatch);
                    Err(e)
                }
                None => Err(e),
            }
        }
    }
}

fn degraded_query<T>(
    key: &OperationKey,
    client: &ResilientClient,
    default: Option<&T>,
) -> crate::Result<T>
where
    T: DeserializeOwned + Clone,
{
    let mismatch = match client.fixture(key) {
        Some(Ok(data)) => return Ok(data),
        Some(Err(mismatch)) => {
            tracing::warn!("Ignoring unusable fallback data: {}", mismatch);
            Some(mismatch)
        }
        None => None,
    };
    match (default, mismatch) {
        (Some(default), _) => Ok(default.clone()),
        (None, Some(mismatch)) => Err(mismatch),
        (None, None) => Err(LifelineError::NoFallbackAvailable(key.clone())),
    }
}

type SuccessCallback<T> = Box<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Per-mutation behaviour
pub struct MutationOptions<T> {
    pub fallback_response: Option<T>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> Default for MutationOptions<T> {
    fn default() -> Self {
        Self {
            fallback_response: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result returned when the mutation is simulated in degraded mode
    pub fn fallback_response(mut self, response: T) -> Self {
        self.fallback_response = Some(response);
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// A bound mutation
pub struct Mutation<T, V, F> {
    key: OperationKey,
    client: ResilientClient,
    mutate: F,
    options: MutationOptions<T>,
    is_loading: bool,
    error: Option<String>,
    _vars: PhantomData<fn(V)>,
}

impl<T, V, F, Fut> Mutation<T, V, F>
where
    T: DeserializeOwned + Clone,
    F: Fn(V) -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Normalized message of the last failure, cleared by a later success
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn mutate(&mut self, vars: V) -> crate::Result<T> {
        let outcome = {
            let _loading = LoadingFlag::raise(&mut self.is_loading);
            if self.client.monitor.state().is_degraded() {
                simulate(&self.key, self.options.fallback_response.as_ref())
            } else {
                (self.mutate)(vars).await
            }
        };

        match outcome {
            Ok(result) => {
                self.error = None;
                if let Some(on_success) = &self.options.on_success {
                    on_success(&result);
                }
                Ok(result)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn fail(&mut self, error: LifelineError) -> LifelineError {
        let message = error.user_message();
        tracing::warn!("Mutation '{}' failed: {}", self.key, message);
        self.error = Some(message.clone());

        if let Some(on_error) = &self.options.on_error {
            on_error(&message);
        }

        let notification = Notification::mutation_failed(&self.key, &message);
        if let Err(e) = self.client.notifier.notify(&notification).await {
            tracing::warn!(
                "Alert via '{}' for '{}' failed: {}",
                self.client.notifier.type_name(),
                self.key,
                e
            );
        }

        LifelineError::Mutation {
            operation: self.key.clone(),
            message,
        }
    }
}

fn simulate<T>(key: &OperationKey, fallback_response: Option<&T>) -> crate::Result<T>
where
    T: DeserializeOwned + Clone,
{
    tracing::info!("Mutation '{}' simulated in degraded mode", key);
    if let Some(response) = fallback_response {
        return Ok(response.clone());
    }
    serde_json::from_value(acknowledgement(key))
        .map_err(|_| LifelineError::NoFallbackAvailable(key.clone()))
}

/// Generic acknowledgement for a simulated mutation
pub fn acknowledgement(key: &OperationKey) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "simulated": true,
        "operation": key.as_str(),
    })
}
