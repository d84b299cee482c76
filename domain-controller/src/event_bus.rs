//! # Event Bus
//!
//! Every state transition of an update and every step of a plan is published
//! here. Subscribers (logging sinks, tests, a future transport) never block
//! the engine: a slow receiver lags and skips old events.

use chrono::{DateTime, Utc};
use domain_client::{ActionClassification, PlanStatus};
use domain_model::{DispatchPhase, HostId, UpdateFailure};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle of one update inside the propagation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateState {
    Pending,
    DomainApplied,
    HostsDispatched,
    Committed,
    RollingBack,
    RolledBack,
    DomainFailed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub enum ControllerEvent {
    /// **Engine**: an update moved to a new state.
    UpdateStateChanged {
        update_id: Uuid,
        kind: &'static str,
        state: UpdateState,
    },

    /// **Engine**: a (compensating) subordinate update was sent to a host.
    HostDispatched {
        update_id: Uuid,
        host: HostId,
        phase: DispatchPhase,
    },

    /// **Engine**: a host failed to apply a (compensating) subordinate update.
    HostFailed {
        update_id: Uuid,
        host: HostId,
        phase: DispatchPhase,
        cause: UpdateFailure,
    },

    /// **Executor**: a plan started.
    PlanStarted {
        plan_id: Uuid,
        actions: usize,
        rollback: bool,
    },

    /// **Executor**: one action of a plan reached its final classification.
    PlanActionCompleted {
        plan_id: Uuid,
        action_id: Uuid,
        classification: ActionClassification,
    },

    /// **Executor**: a plan finished.
    PlanCompleted { plan_id: Uuid, status: PlanStatus },
}

/// An event with the time it was published.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub at: DateTime<Utc>,
    pub event: ControllerEvent,
}

/// A wrapper around a tokio broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// See [`tokio::sync::broadcast::channel`]. `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(EventEnvelope {
            at: Utc::now(),
            event,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_stamped_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let before = Utc::now();

        bus.publish(ControllerEvent::PlanStarted {
            plan_id: Uuid::new_v4(),
            actions: 2,
            rollback: true,
        });

        let envelope = rx.recv().await.unwrap();
        assert!(envelope.at >= before);
        assert!(matches!(
            envelope.event,
            ControllerEvent::PlanStarted { actions: 2, .. }
        ));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        bus.publish(ControllerEvent::PlanCompleted {
            plan_id: Uuid::new_v4(),
            status: PlanStatus::Applied,
        });
    }
}
