use domain_client::{DeploymentActionResult, ServerUpdateResult};
use domain_model::{DispatchPhase, HostFailure, PropagationOutcome};

/// Folds the forward outcome of an action into its result.
pub fn record_outcome(result: &mut DeploymentActionResult, outcome: &PropagationOutcome, groups: &[String]) {
    for group in groups {
        result.group_result_mut(group);
    }
    match outcome {
        PropagationOutcome::Committed(servers) => {
            for server in servers {
                result.record_server(server, ServerUpdateResult::Success);
            }
        }
        PropagationOutcome::PartiallyFailed {
            affected_servers,
            host_failures,
            rolled_back,
        } => {
            for (host, failure) in host_failures {
                result.record_host_failure(host.clone(), failure.clone());
            }
            for server in affected_servers {
                let server_result = match host_failures.get(server.host()) {
                    Some(failure) => failed(failure),
                    None if *rolled_back => ServerUpdateResult::RolledBack,
                    None => ServerUpdateResult::Success,
                };
                result.record_server(server, server_result);
            }
            if *rolled_back {
                result.mark_rolled_back_on_domain();
            }
        }
        PropagationOutcome::DomainFailure(cause) => {
            result.set_domain_controller_failure(cause.clone());
        }
        PropagationOutcome::Cancelled => result.mark_cancelled_by_domain(),
    }
}

/// Folds the outcome of undoing an already applied action into its result.
///
/// Returns `false` when the domain model could not be compensated.
pub fn record_compensation(result: &mut DeploymentActionResult, outcome: &PropagationOutcome) -> bool {
    match outcome {
        PropagationOutcome::Committed(_) => {
            result.mark_rolled_back_on_domain();
            true
        }
        PropagationOutcome::PartiallyFailed {
            affected_servers,
            host_failures,
            ..
        } => {
            result.mark_rolled_back_on_domain();
            for (host, failure) in host_failures {
                let failure = HostFailure::compensation(failure.cause().clone());
                result.record_host_failure(host.clone(), failure.clone());
                for server in affected_servers.iter().filter(|s| s.host() == host) {
                    result.record_server(server, failed(&failure));
                }
            }
            true
        }
        PropagationOutcome::DomainFailure(_) | PropagationOutcome::Cancelled => false,
    }
}

fn failed(failure: &HostFailure) -> ServerUpdateResult {
    match failure.phase() {
        DispatchPhase::Forward => ServerUpdateResult::Failed(failure.cause().clone()),
        DispatchPhase::Compensation => ServerUpdateResult::RollbackFailed(failure.cause().clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_client::{ActionClassification, ContentReference, DeploymentAction};
    use domain_model::{ContentHash, HostId, ServerIdentity, UpdateFailure};
    use std::collections::{BTreeMap, BTreeSet};

    fn server(host: &str, name: &str) -> ServerIdentity {
        ServerIdentity::new(HostId::new(host), name, "main")
    }

    fn result() -> DeploymentActionResult {
        DeploymentActionResult::new(DeploymentAction::deploy(
            "app.war",
            ContentReference::new("app.war", ContentHash::new("h")),
        ))
    }

    #[test]
    fn test_partial_failure_is_split_per_server() {
        let mut result = result();
        let outcome = PropagationOutcome::PartiallyFailed {
            affected_servers: BTreeSet::from([server("host-a", "one"), server("host-b", "two")]),
            host_failures: BTreeMap::from([(
                HostId::new("host-b"),
                HostFailure::forward(UpdateFailure::Timeout {
                    host: HostId::new("host-b"),
                    timeout_ms: 10,
                }),
            )]),
            rolled_back: true,
        };

        record_outcome(&mut result, &outcome, &["main".to_string()]);

        let group = &result.results_by_server_group()["main"];
        assert_eq!(
            group.result_for(&server("host-a", "one")),
            Some(&ServerUpdateResult::RolledBack)
        );
        assert!(matches!(
            group.result_for(&server("host-b", "two")),
            Some(ServerUpdateResult::Failed(cause)) if cause.is_timeout()
        ));
        assert!(result.is_rolled_back_on_domain());
        assert_eq!(result.classification(), ActionClassification::HostFailed);
    }

    #[test]
    fn test_failed_compensation_marks_rollback_failed() {
        let mut result = result();
        let servers = BTreeSet::from([server("host-a", "one")]);
        record_outcome(
            &mut result,
            &PropagationOutcome::Committed(servers.clone()),
            &["main".to_string()],
        );

        let undo = PropagationOutcome::PartiallyFailed {
            affected_servers: servers,
            host_failures: BTreeMap::from([(
                HostId::new("host-a"),
                HostFailure::forward(UpdateFailure::state("gone")),
            )]),
            rolled_back: false,
        };
        assert!(record_compensation(&mut result, &undo));

        let failure = &result.host_failures()[&HostId::new("host-a")];
        assert_eq!(failure.phase(), DispatchPhase::Compensation);
        assert!(matches!(
            result.results_by_server_group()["main"].result_for(&server("host-a", "one")),
            Some(ServerUpdateResult::RollbackFailed(_))
        ));
    }
}
