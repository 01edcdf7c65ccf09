//! BDD step definitions for resilient mutation feature

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cucumber::{then, when};
use serde_json::{json, Value};

use lifeline::{LifelineError, MutationOptions};

use crate::world::LifelineWorld;

async fn run_mutation(world: &mut LifelineWorld, key: String, fallback: Option<Value>) {
    let client = world.client();
    let live = world.live_response.clone();
    let calls = Arc::clone(&world.live_calls);
    let messages = Arc::clone(&world.on_error_messages);

    let mut options = MutationOptions::new().on_error(move |message: &str| {
        messages.lock().unwrap().push(message.to_string());
    });
    if let Some(fallback) = fallback {
        options = options.fallback_response(fallback);
    }

    let mut mutation = client.mutation(
        key,
        move |_vars: Value| {
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
        options,
    );

    let outcome = mutation.mutate(json!({"title": "Draft"})).await;
    assert!(!mutation.is_loading());
    world.mutation_result = Some(outcome.map_err(|e| e.to_string()));
}

#[when(expr = "I mutate {string}")]
async fn mutate(world: &mut LifelineWorld, key: String) {
    run_mutation(world, key, None).await;
}

#[when(expr = "I mutate {string} with fallback response {string}")]
async fn mutate_with_fallback(world: &mut LifelineWorld, key: String, fallback: String) {
    let fallback: Value = serde_json::from_str(&fallback).expect("invalid JSON");
    run_mutation(world, key, Some(fallback)).await;
}

#[then(expr = "the mutation should resolve to {string}")]
fn mutation_resolves(world: &mut LifelineWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).expect("invalid JSON");
    let result = world.mutation_result.as_ref().expect("no mutation result");
    assert_eq!(result.as_ref().unwrap(), &expected);
}

#[then(expr = "the mutation should be acknowledged as simulated for {string}")]
fn mutation_acknowledged(world: &mut LifelineWorld, key: String) {
    let result = world.mutation_result.as_ref().expect("no mutation result");
    let ack = result.as_ref().unwrap();
    assert_eq!(ack["success"], true);
    assert_eq!(ack["simulated"], true);
    assert_eq!(ack["operation"], key.as_str());
}

#[then(expr = "the mutation should fail with message {string}")]
fn mutation_fails(world: &mut LifelineWorld, expected: String) {
    let result = world.mutation_result.as_ref().expect("no mutation result");
    assert_eq!(result.as_ref().unwrap_err(), &expected);
}

#[then(expr = "the error callback should have received {string} once")]
fn error_callback_once(world: &mut LifelineWorld, expected: String) {
    let messages = world.on_error_messages.lock().unwrap();
    assert_eq!(*messages, vec![expected]);
}

#[then("the error callback should not have been called")]
fn error_callback_not_called(world: &mut LifelineWorld) {
    assert!(world.on_error_messages.lock().unwrap().is_empty());
}

#[then(expr = "the user should be alerted {string} for {string} with {string}")]
fn user_alerted(world: &mut LifelineWorld, title: String, key: String, message: String) {
    let notifier = world.notifier.as_ref().expect("notifier not set");
    let records = notifier.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, title);
    assert_eq!(records[0].operation.as_str(), key);
    assert_eq!(records[0].message, message);
}

#[then("the user should not be alerted")]
fn user_not_alerted(world: &mut LifelineWorld) {
    if let Some(notifier) = world.notifier.as_ref() {
        assert!(notifier.records().is_empty());
    }
}
