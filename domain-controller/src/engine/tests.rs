use super::*;
use crate::event_bus::EventEnvelope;
use async_trait::async_trait;
use domain_model::{HostModel, ProfileElement, ServerElement, ServerGroupElement};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Call = (HostId, Vec<(ServerIdentity, ServerUpdate)>);

// --- Spy Host Executor ---
#[derive(Default)]
struct SpyHosts {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<BTreeSet<HostId>>,
    failing_compensation: Mutex<BTreeSet<HostId>>,
    delays: Mutex<BTreeMap<HostId, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SpyHosts {
    fn fail(&self, host: &str) {
        self.failing.lock().unwrap().insert(HostId::new(host));
    }

    fn fail_compensation(&self, host: &str) {
        self.failing_compensation
            .lock()
            .unwrap()
            .insert(HostId::new(host));
    }

    fn delay(&self, host: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(HostId::new(host), delay);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// The update the first server of `host` received, call by call.
    fn calls_to(&self, host: &str) -> Vec<ServerUpdate> {
        self.calls()
            .into_iter()
            .filter(|(h, _)| h.as_str() == host)
            .filter_map(|(_, updates)| updates.into_iter().next().map(|(_, u)| u))
            .collect()
    }
}

#[async_trait]
impl HostExecutor for SpyHosts {
    async fn apply_to_host(
        &self,
        host: &HostId,
        updates: &[(ServerIdentity, ServerUpdate)],
        _timeout: Duration,
    ) -> Result<(), UpdateFailure> {
        let previous_calls = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls.iter().filter(|(h, _)| h == host).count();
            calls.push((host.clone(), updates.to_vec()));
            previous
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(host).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fails = if previous_calls == 0 {
            self.failing.lock().unwrap().contains(host)
        } else {
            self.failing_compensation.lock().unwrap().contains(host)
        };
        if fails {
            return Err(UpdateFailure::rejected(
                host.clone(),
                updates[0].0.server_name(),
                UpdateFailure::state("refused"),
            ));
        }
        Ok(())
    }
}

/// Three hosts with one server each, all in group "main".
fn domain() -> DomainModel {
    let mut model = DomainModel::new();
    model.add_profile(ProfileElement::new("default")).unwrap();
    model
        .add_server_group(ServerGroupElement::new("main", "default"))
        .unwrap();
    for (host, server) in [("host-a", "one"), ("host-b", "two"), ("host-c", "three")] {
        model
            .register_host(HostModel::new(HostId::new(host)).with_server(ServerElement::new(server, "main")))
            .unwrap();
    }
    model
}

fn engine(hosts: Arc<SpyHosts>, timeout_ms: u64) -> (UpdatePropagationEngine<SpyHosts>, EventBus) {
    let config = ControllerConfig {
        host_timeout_ms: timeout_ms,
        ..Default::default()
    };
    let bus = EventBus::new(config.event_capacity);
    (UpdatePropagationEngine::new(hosts, bus.clone(), &config), bus)
}

fn set_mode() -> DomainUpdate {
    DomainUpdate::SetSystemProperty {
        name: "mode".into(),
        value: "prod".into(),
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<EventEnvelope>) -> Vec<UpdateState> {
    let mut states = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if let ControllerEvent::UpdateStateChanged { state, .. } = envelope.event {
            states.push(state);
        }
    }
    states
}

/// Verification Test: Invalid Updates Never Reach a Host
///
/// **Objective**: A domain-level rejection results in `DomainFailure`, zero
/// host interactions and an untouched model.
#[tokio::test]
async fn test_domain_failure_contacts_no_host() {
    let _ = env_logger::builder().is_test(true).try_init();
    let hosts = Arc::new(SpyHosts::default());
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();
    let original = model.clone();

    let outcome = engine
        .propagate(
            &mut model,
            &DomainUpdate::RemovePath {
                name: "missing".into(),
            },
            &PropagationOptions::with_rollback(true),
        )
        .await;

    assert!(matches!(
        outcome,
        PropagationOutcome::DomainFailure(UpdateFailure::NotFound { .. })
    ));
    assert!(outcome.nothing_attempted());
    assert!(hosts.calls().is_empty());
    assert_eq!(model, original);
}

#[tokio::test]
async fn test_all_hosts_succeed_commits() {
    let _ = env_logger::builder().is_test(true).try_init();
    let hosts = Arc::new(SpyHosts::default());
    let (engine, bus) = engine(hosts.clone(), 1000);
    let mut rx = bus.subscribe();
    let mut model = domain();

    let outcome = engine
        .propagate(&mut model, &set_mode(), &PropagationOptions::with_rollback(true))
        .await;

    let servers = outcome.affected_servers().unwrap();
    assert!(outcome.is_committed());
    assert_eq!(servers.len(), 3);
    assert_eq!(hosts.calls().len(), 3);
    assert_eq!(model.system_properties().get("mode"), Some("prod"));
    assert_eq!(
        drain(&mut rx),
        vec![
            UpdateState::Pending,
            UpdateState::DomainApplied,
            UpdateState::HostsDispatched,
            UpdateState::Committed,
        ]
    );
}

/// Verification Test: Rollback Round Trip
///
/// **Objective**: When one host fails and rollback is enabled, the model equals
/// the pre-call model and each host that had succeeded is re-contacted exactly
/// once with the compensating subordinate update.
///
/// **Scenario**:
/// 1. host-b refuses the update.
/// 2. host-a and host-c apply it.
/// 3. host-a and host-c receive `RemoveSystemProperty(mode)`, host-b nothing more.
#[tokio::test]
async fn test_host_failure_rolls_back_domain_and_hosts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let hosts = Arc::new(SpyHosts::default());
    hosts.fail("host-b");
    let (engine, bus) = engine(hosts.clone(), 1000);
    let mut rx = bus.subscribe();
    let mut model = domain();
    let original = model.clone();

    let outcome = engine
        .propagate(&mut model, &set_mode(), &PropagationOptions::with_rollback(true))
        .await;

    assert!(outcome.is_rolled_back());
    assert_eq!(model, original);

    let failures = outcome.host_failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[&HostId::new("host-b")].phase(), DispatchPhase::Forward);

    let undo = ServerUpdate::RemoveSystemProperty {
        name: "mode".into(),
    };
    for host in ["host-a", "host-c"] {
        let calls = hosts.calls_to(host);
        assert_eq!(calls.len(), 2, "{} should be contacted twice", host);
        assert_eq!(calls[1], undo);
    }
    assert_eq!(hosts.calls_to("host-b").len(), 1);

    let states = drain(&mut rx);
    assert_eq!(states.last(), Some(&UpdateState::RolledBack));
    assert!(states.contains(&UpdateState::RollingBack));
}

#[tokio::test]
async fn test_host_failure_without_rollback_keeps_change() {
    let hosts = Arc::new(SpyHosts::default());
    hosts.fail("host-c");
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();

    let outcome = engine
        .propagate(&mut model, &set_mode(), &PropagationOptions::with_rollback(false))
        .await;

    match outcome {
        PropagationOutcome::PartiallyFailed {
            host_failures,
            rolled_back,
            ..
        } => {
            assert!(!rolled_back);
            assert!(host_failures.contains_key(&HostId::new("host-c")));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(model.system_properties().get("mode"), Some("prod"));
    assert_eq!(hosts.calls().len(), 3);
}

/// Verification Test: Host Timeout
///
/// **Objective**: A host that does not answer in time is reported under its id
/// with a timeout cause, and the successes of its siblings are still recorded.
#[tokio::test]
async fn test_host_timeout_is_a_host_failure() {
    let _ = env_logger::builder().is_test(true).try_init();
    let hosts = Arc::new(SpyHosts::default());
    hosts.delay("host-b", Duration::from_secs(5));
    let (engine, _) = engine(hosts.clone(), 100);
    let mut model = domain();

    let outcome = engine
        .propagate(&mut model, &set_mode(), &PropagationOptions::with_rollback(false))
        .await;

    let failures = outcome.host_failures().unwrap();
    assert_eq!(failures.len(), 1);
    let cause = failures[&HostId::new("host-b")].cause();
    assert!(cause.is_timeout());
    assert!(matches!(
        cause,
        UpdateFailure::Timeout { timeout_ms: 100, .. }
    ));
    assert_eq!(outcome.affected_servers().unwrap().len(), 3);
    assert_eq!(model.system_properties().get("mode"), Some("prod"));
}

#[tokio::test]
async fn test_compensation_failure_is_recorded() {
    let hosts = Arc::new(SpyHosts::default());
    hosts.fail("host-a");
    hosts.fail_compensation("host-b");
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();
    let original = model.clone();

    let outcome = engine
        .propagate(&mut model, &set_mode(), &PropagationOptions::with_rollback(true))
        .await;

    let failures = outcome.host_failures().unwrap();
    assert_eq!(failures[&HostId::new("host-a")].phase(), DispatchPhase::Forward);
    assert_eq!(
        failures[&HostId::new("host-b")].phase(),
        DispatchPhase::Compensation
    );
    assert!(!failures.contains_key(&HostId::new("host-c")));
    assert!(outcome.is_rolled_back());
    assert_eq!(model, original);
}

#[tokio::test]
async fn test_cancellation_before_dispatch() {
    let hosts = Arc::new(SpyHosts::default());
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();
    let original = model.clone();
    let handle = CancellationHandle::new();
    handle.cancel();

    let outcome = engine
        .propagate(
            &mut model,
            &set_mode(),
            &PropagationOptions {
                cancellation: Some(handle),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(outcome, PropagationOutcome::Cancelled);
    assert!(hosts.calls().is_empty());
    assert_eq!(model, original);
}

#[tokio::test]
async fn test_domain_only_update_commits_without_hosts() {
    let hosts = Arc::new(SpyHosts::default());
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();

    let outcome = engine
        .propagate(
            &mut model,
            &DomainUpdate::AddProfile {
                profile: ProfileElement::new("web"),
            },
            &PropagationOptions::default(),
        )
        .await;

    assert_eq!(outcome, PropagationOutcome::Committed(BTreeSet::new()));
    assert!(model.profile("web").is_some());
    assert!(hosts.calls().is_empty());
}

#[tokio::test]
async fn test_tolerated_failures_do_not_roll_back() {
    let hosts = Arc::new(SpyHosts::default());
    hosts.fail("host-a");
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();
    let options = PropagationOptions {
        rollback: RollbackPolicy::on_failure().tolerate(
            "main",
            FailureTolerance {
                max_failures: 1,
                max_failure_percentage: 0,
            },
        ),
        ..Default::default()
    };

    let outcome = engine.propagate(&mut model, &set_mode(), &options).await;

    assert!(!outcome.is_rolled_back());
    assert_eq!(outcome.host_failures().map(|f| f.len()), Some(1));
    assert_eq!(model.system_properties().get("mode"), Some("prod"));
    assert_eq!(hosts.calls().len(), 3);
}

#[tokio::test]
async fn test_sequential_dispatch_contacts_one_host_at_a_time() {
    let hosts = Arc::new(SpyHosts::default());
    for host in ["host-a", "host-b", "host-c"] {
        hosts.delay(host, Duration::from_millis(20));
    }
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();

    let outcome = engine
        .propagate(
            &mut model,
            &set_mode(),
            &PropagationOptions {
                sequential: true,
                ..Default::default()
            },
        )
        .await;

    assert!(outcome.is_committed());
    assert_eq!(hosts.max_in_flight.load(Ordering::SeqCst), 1);
}

/// Verification Test: Removing an Override Falls Back
///
/// **Objective**: Hosts receive the value their servers resolve to after the
/// change, not a blind removal.
///
/// **Scenario**:
/// 1. The domain sets `mode=dev`, host-a overrides it with `mode=prod`.
/// 2. The host-a override is removed.
/// 3. host-a is told to set `mode=dev`, the other hosts are not contacted.
#[tokio::test]
async fn test_override_removal_sends_the_fallback_value() {
    let _ = env_logger::builder().is_test(true).try_init();
    let hosts = Arc::new(SpyHosts::default());
    let (engine, _) = engine(hosts.clone(), 1000);
    let mut model = domain();
    model.system_properties_mut().set("mode", "dev");
    model
        .host_mut(&HostId::new("host-a"))
        .unwrap()
        .system_properties_mut()
        .set("mode", "prod");

    let outcome = engine
        .propagate(
            &mut model,
            &DomainUpdate::RemoveHostSystemProperty {
                host: HostId::new("host-a"),
                name: "mode".into(),
            },
            &PropagationOptions::with_rollback(true),
        )
        .await;

    assert!(outcome.is_committed());
    assert_eq!(
        hosts.calls_to("host-a"),
        vec![ServerUpdate::SetSystemProperty {
            name: "mode".into(),
            value: "dev".into(),
        }]
    );
    assert_eq!(hosts.calls().len(), 1);
}
