//! BDD step definitions for lifeline builder and lifecycle feature

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::Value;

use lifeline::io::{HttpClient, HttpRequest, HttpResponse};
use lifeline::probe::ProbeResult;
use lifeline::{Config, LifelineBuilder, LifelineError, OperationKey};

use crate::world::{LifelineWorld, ScriptedProbe};

// --- Test doubles ---

/// An HTTP client that answers every request with a fixed envelope, or
/// refuses every connection
#[derive(Debug)]
struct StubBackend {
    down: bool,
}

impl StubBackend {
    fn answer(&self) -> lifeline::Result<HttpResponse> {
        if self.down {
            Err(LifelineError::Http("connection refused".to_string()))
        } else {
            Ok(HttpResponse::json(
                r#"{"result": {"data": {"items": [], "total": 0, "live": true}}}"#,
            ))
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for StubBackend {
    async fn get(&self, _url: &str) -> lifeline::Result<HttpResponse> {
        self.answer()
    }

    async fn send(&self, _request: &HttpRequest) -> lifeline::Result<HttpResponse> {
        self.answer()
    }
}

fn config(world: &mut LifelineWorld) -> &mut Config {
    world.builder_config.get_or_insert_with(|| {
        let mut config = Config::default();
        config.status.enabled = false;
        config
    })
}

#[given("a lifeline configuration without a status surface")]
fn configuration(world: &mut LifelineWorld) {
    config(world);
}

#[given("the configured backend is down")]
fn configured_backend_down(world: &mut LifelineWorld) {
    world.backend_down = true;
}

#[given(expr = "a fixtures file containing {string}")]
fn fixtures_file(world: &mut LifelineWorld, contents: String) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    config(world).fallback.fixtures_path = Some(file.path().to_path_buf());
    world.fixtures_file = Some(file);
}

#[when("the lifeline is built")]
fn build(world: &mut LifelineWorld) {
    let config = config(world).clone();
    let probe = Arc::new(ScriptedProbe::always(if world.backend_down {
        ProbeResult::failure("connection refused")
    } else {
        ProbeResult::success()
    }));
    let lifeline = LifelineBuilder::new(config)
        .with_http_client(Arc::new(StubBackend {
            down: world.backend_down,
        }))
        .with_probe(Arc::clone(&probe) as Arc<dyn lifeline::probe::Probe>)
        .build()
        .expect("lifeline should build");
    world.monitor = Some(Arc::clone(lifeline.monitor()));
    world.probe = Some(probe);
    world.lifeline = Some(lifeline);
}

#[when(expr = "{string} is queried over RPC")]
async fn rpc_query(world: &mut LifelineWorld, key: String) {
    let lifeline = world.lifeline.as_ref().expect("lifeline not built");
    let result = lifeline.rpc().query::<Value>(key, None).await;
    world.rpc_result = Some(result.map_err(|e| e.to_string()));
}

#[when("the lifeline is started and then cancelled")]
async fn start_and_cancel(world: &mut LifelineWorld) {
    let lifeline = world.lifeline.take().expect("lifeline not built");
    let token = lifeline.cancellation_token();
    let probe = Arc::clone(world.probe.as_ref().expect("probe not set"));

    let handle = tokio::spawn(lifeline.start());

    for _ in 0..100 {
        if probe.calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("lifeline did not stop")
        .expect("lifeline task panicked");
    world.lifecycle_result = Some(result);
}

#[then(expr = "the fallback registry should contain {string}")]
fn registry_contains(world: &mut LifelineWorld, key: String) {
    let lifeline = world.lifeline.as_ref().expect("lifeline not built");
    assert!(lifeline
        .client()
        .registry()
        .contains(&OperationKey::new(key)));
}

#[then(expr = "the fallback registry should not contain {string}")]
fn registry_lacks(world: &mut LifelineWorld, key: String) {
    let lifeline = world.lifeline.as_ref().expect("lifeline not built");
    assert!(!lifeline
        .client()
        .registry()
        .contains(&OperationKey::new(key)));
}

#[then(expr = "the RPC result should have {string} equal to {string}")]
fn rpc_field(world: &mut LifelineWorld, field: String, expected: String) {
    let result = world.rpc_result.as_ref().expect("no RPC result");
    let data = result.as_ref().unwrap();
    let expected: Value = serde_json::from_str(&expected).expect("invalid JSON");
    assert_eq!(data[field.as_str()], expected);
}

#[then("the lifeline should stop cleanly")]
fn stopped_cleanly(world: &mut LifelineWorld) {
    let result = world.lifecycle_result.as_ref().expect("lifeline not run");
    assert!(result.is_ok());
}

#[then("the monitor should no longer be running")]
fn monitor_not_running(world: &mut LifelineWorld) {
    assert!(!world.monitor().is_running());
}

#[then("the backend should have been probed")]
fn backend_probed(world: &mut LifelineWorld) {
    let probe = world.probe.as_ref().expect("probe not set");
    assert!(probe.calls() >= 1);
}
