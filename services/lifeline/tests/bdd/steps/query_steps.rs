//! BDD step definitions for resilient query feature

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cucumber::{given, then, when};
use serde_json::Value;

use lifeline::{FallbackRegistry, LifelineError, OperationKey};

use crate::world::LifelineWorld;

fn parse_json(s: &str) -> Value {
    serde_json::from_str(s).expect("step argument is not valid JSON")
}

async fn run_query(world: &mut LifelineWorld, key: String, default: Option<Value>) {
    let client = world.client();
    let live = world.live_response.clone();
    let calls = Arc::clone(&world.live_calls);

    let mut query = client.query(
        key,
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let live = live.clone();
            async move {
                match live {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(message)) => Err(LifelineError::Http(message)),
                    None => Err(LifelineError::Http("connection refused".to_string())),
                }
            }
        },
        default,
    );

    let result = query.fetch().await;
    assert!(!result.is_loading);
    world.query_data = result.data.clone();
    world.query_error = result.error.as_ref().map(|e| e.to_string());
}

#[given(expr = "the live backend answers {string}")]
fn live_answers(world: &mut LifelineWorld, body: String) {
    world.live_response = Some(Ok(parse_json(&body)));
}

#[given(expr = "the live backend fails with {string}")]
fn live_fails(world: &mut LifelineWorld, message: String) {
    world.live_response = Some(Err(message));
}

#[given("an empty fallback registry")]
fn empty_registry(world: &mut LifelineWorld) {
    world.registry = Some(FallbackRegistry::empty());
}

#[when(expr = "I query {string}")]
async fn query(world: &mut LifelineWorld, key: String) {
    run_query(world, key, None).await;
}

#[when(expr = "I query {string} with default {string}")]
async fn query_with_default(world: &mut LifelineWorld, key: String, default: String) {
    run_query(world, key, Some(parse_json(&default))).await;
}

#[then(expr = "the query data should be the {string} fixture")]
fn data_is_fixture(world: &mut LifelineWorld, key: String) {
    let registry = FallbackRegistry::builtin().expect("builtin fixtures");
    let fixture = registry
        .lookup(&OperationKey::new(key))
        .expect("fixture missing");
    assert_eq!(world.query_data.as_ref(), Some(fixture));
}

#[then(expr = "the query data should be {string}")]
fn data_is(world: &mut LifelineWorld, expected: String) {
    assert_eq!(world.query_data, Some(parse_json(&expected)));
}

#[then(expr = "the query data should have {int} items")]
fn data_has_items(world: &mut LifelineWorld, count: usize) {
    let data = world.query_data.as_ref().expect("no query data");
    let items = data["items"].as_array().expect("no items array");
    assert_eq!(items.len(), count);
    assert_eq!(data["total"], count as u64);
}

#[then("the query should have no error")]
fn no_error(world: &mut LifelineWorld) {
    assert_eq!(world.query_error, None);
}

#[then(expr = "the query should fail with {string}")]
fn query_fails(world: &mut LifelineWorld, expected: String) {
    assert_eq!(world.query_data, None);
    assert_eq!(world.query_error.as_deref(), Some(expected.as_str()));
}

#[then(expr = "the live backend should have been called {int} time(s)")]
fn live_called(world: &mut LifelineWorld, expected: usize) {
    assert_eq!(world.live_calls.load(Ordering::SeqCst), expected);
}
