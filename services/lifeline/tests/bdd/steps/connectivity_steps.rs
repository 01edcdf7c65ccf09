//! BDD step definitions for connectivity monitoring feature

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cucumber::{given, then, when};

use lifeline::config::ConnectivityConfig;
use lifeline::monitor::{ConnectivityMonitor, Health};
use lifeline::probe::ProbeResult;

use crate::world::{LifelineWorld, ScriptedProbe};

fn parse_health(s: &str) -> Health {
    match s {
        "Healthy" => Health::Healthy,
        "Degraded" => Health::Degraded,
        other => panic!("Unknown health: {}", other),
    }
}

fn install(world: &mut LifelineWorld, probe: ScriptedProbe, force_fallback: bool) {
    let probe = Arc::new(probe);
    let config = ConnectivityConfig {
        force_fallback,
        ..Default::default()
    };
    world.monitor = Some(Arc::new(ConnectivityMonitor::new(
        Arc::clone(&probe) as Arc<dyn lifeline::probe::Probe>,
        &config,
    )));
    world.probe = Some(probe);
}

#[given(expr = "a backend whose probes go {string}")]
fn scripted_backend(world: &mut LifelineWorld, script: String) {
    install(world, ScriptedProbe::from_script(&script), false);
}

#[given("a backend that fails every probe")]
fn failing_backend(world: &mut LifelineWorld) {
    install(
        world,
        ScriptedProbe::always(ProbeResult::failure("connection refused")),
        false,
    );
}

#[given("a reachable backend")]
fn reachable_backend(world: &mut LifelineWorld) {
    install(world, ScriptedProbe::always(ProbeResult::success()), false);
}

#[given("a reachable backend with fallback mode forced")]
fn forced_fallback_backend(world: &mut LifelineWorld) {
    install(world, ScriptedProbe::always(ProbeResult::success()), true);
}

#[given("the backend has been found unreachable")]
async fn backend_found_unreachable(world: &mut LifelineWorld) {
    install(
        world,
        ScriptedProbe::always(ProbeResult::failure("connection refused")),
        false,
    );
    world.monitor().retry().await;
}

#[given("a subscriber to connectivity changes")]
fn subscriber(world: &mut LifelineWorld) {
    let seen = Arc::clone(&world.notifications_seen);
    let subscription = world.monitor().subscribe(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    world.subscription = Some(subscription);
}

#[when("the monitor probes")]
async fn monitor_probes(world: &mut LifelineWorld) {
    let state = world.monitor().retry().await;
    world.observed.push(state.health());
}

#[when(expr = "the monitor probes {int} times")]
async fn monitor_probes_times(world: &mut LifelineWorld, times: usize) {
    for _ in 0..times {
        let state = world.monitor().retry().await;
        world.observed.push(state.health());
    }
}

#[when("the subscriber unsubscribes")]
fn unsubscribe(world: &mut LifelineWorld) {
    if let Some(subscription) = world.subscription.take() {
        subscription.unsubscribe();
    }
}

#[then(expr = "the connectivity should be {string}")]
fn connectivity_should_be(world: &mut LifelineWorld, expected: String) {
    assert_eq!(world.monitor().health(), parse_health(&expected));
}

#[then(expr = "the observed states should be {string}")]
fn observed_states(world: &mut LifelineWorld, expected: String) {
    let expected: Vec<Health> = expected.split(',').map(|s| parse_health(s.trim())).collect();
    assert_eq!(world.observed, expected);
}

#[then("the backend should be reported available")]
fn backend_available(world: &mut LifelineWorld) {
    let state = world.monitor().state();
    assert!(state.is_available);
    assert!(state.last_error.is_none());
}

#[then(expr = "the backend should be reported unavailable with error {string}")]
fn backend_unavailable(world: &mut LifelineWorld, error: String) {
    let state = world.monitor().state();
    assert!(!state.is_available);
    assert_eq!(state.last_error.as_deref(), Some(error.as_str()));
}

#[then(expr = "the subscriber should have been notified {int} time(s)")]
fn subscriber_notified(world: &mut LifelineWorld, expected: usize) {
    assert_eq!(world.notifications_seen.load(Ordering::SeqCst), expected);
}

#[then(expr = "the backend should have been probed {int} time(s)")]
fn probed_times(world: &mut LifelineWorld, expected: usize) {
    let probe = world.probe.as_ref().expect("probe not set");
    assert_eq!(probe.calls(), expected);
}
