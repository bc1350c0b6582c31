//! Runtime lifecycle event relay
//!
//! Forwards every event from the runtime's feed to the sink. Losing the feed
//! is fatal: the relay never reconnects and instead hands a [`RelayError`]
//! back to the caller, which is expected to exit the process.

use crate::health::{components, HealthRegistry};
use crate::models::Payload;
use crate::observability::AgentMetrics;
use crate::runtime::{ContainerRuntime, EventSubscription, RuntimeError};
use crate::sync::Sink;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reasons the relay stopped
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to subscribe to runtime events: {0}")]
    Subscribe(#[source] RuntimeError),
    #[error("event stream failed: {0}")]
    Stream(#[source] RuntimeError),
    #[error("event stream reached end of stream")]
    EndOfStream,
    #[error("event channel closed")]
    ChannelClosed,
}

/// Long-lived subscription forwarding runtime events to a sink
pub struct EventRelay {
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn Sink>,
    health: HealthRegistry,
    metrics: AgentMetrics,
}

impl EventRelay {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, sink: Arc<dyn Sink>) -> Self {
        Self {
            runtime,
            sink,
            health: HealthRegistry::new(),
            metrics: AgentMetrics::new(),
        }
    }

    /// Report relay state into a shared health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Subscribe and relay until the subscription is lost
    ///
    /// Only returns on failure; the returned error is the termination reason.
    pub async fn run(self) -> RelayError {
        let subscription = match self.runtime.events().await {
            Ok(subscription) => subscription,
            Err(e) => return self.terminate(RelayError::Subscribe(e)).await,
        };
        info!("Event relay subscribed to runtime events");
        self.health.set_healthy(components::EVENT_RELAY).await;

        let reason = self.relay(subscription).await;
        self.terminate(reason).await
    }

    async fn relay(&self, subscription: EventSubscription) -> RelayError {
        let EventSubscription {
            mut messages,
            mut errors,
        } = subscription;

        loop {
            tokio::select! {
                // Drain pending events before acting on the error side-channel
                biased;

                message = messages.recv() => match message {
                    Some(event) => self.forward(event).await,
                    None => return match errors.try_recv() {
                        Ok(Err(e)) => RelayError::Stream(e),
                        Ok(Ok(())) => RelayError::EndOfStream,
                        Err(_) => RelayError::ChannelClosed,
                    },
                },
                outcome = &mut errors => {
                    return match outcome {
                        Ok(Err(e)) => RelayError::Stream(e),
                        Ok(Ok(())) | Err(_) => RelayError::EndOfStream,
                    };
                }
            }
        }
    }

    async fn forward(&self, event: crate::models::LifecycleEvent) {
        let payload = Payload::Event(event);
        let kind = payload.kind();

        match self.sink.send(payload).await {
            Ok(()) => {
                self.metrics.inc_events_relayed();
                debug!("Relayed runtime event");
            }
            Err(e) => {
                warn!(error = %e, kind = %kind, "Failed to deliver runtime event");
                self.metrics.inc_sink_errors(kind.as_str());
            }
        }
    }

    async fn terminate(&self, reason: RelayError) -> RelayError {
        error!(error = %reason, "Event relay terminated");
        self.health
            .set_unhealthy(components::EVENT_RELAY, reason.to_string())
            .await;
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::test_support::{MockRuntime, RecordingSink};
    use serde_json::json;
    use std::time::Duration;

    fn relay_for(runtime: MockRuntime, sink: Arc<RecordingSink>) -> (EventRelay, HealthRegistry) {
        let health = HealthRegistry::new();
        let relay = EventRelay::new(Arc::new(runtime), sink).with_health(health.clone());
        (relay, health)
    }

    async fn run_bounded(relay: EventRelay) -> RelayError {
        tokio::time::timeout(Duration::from_secs(5), relay.run())
            .await
            .expect("relay should terminate")
    }

    #[tokio::test]
    async fn test_stream_error_terminates_without_retry() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let sink = Arc::new(RecordingSink::default());
        let (relay, health) = relay_for(runtime, sink.clone());

        let handle = tokio::spawn(relay.run());
        message_tx
            .send(json!({"Type": "container", "Action": "start"}))
            .await
            .unwrap();
        error_tx
            .send(Err(RuntimeError::Status {
                status: 500,
                message: "connection reset".to_string(),
            }))
            .unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("relay should terminate")
            .unwrap();

        assert!(matches!(reason, RelayError::Stream(_)));
        assert_eq!(
            health.status(components::EVENT_RELAY).await,
            Some(ComponentStatus::Unhealthy)
        );
        drop(message_tx);
    }

    #[tokio::test]
    async fn test_end_of_stream_terminates() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let (relay, _health) = relay_for(runtime, Arc::new(RecordingSink::default()));

        error_tx.send(Ok(())).unwrap();
        let reason = run_bounded(relay).await;

        assert!(matches!(reason, RelayError::EndOfStream));
        drop(message_tx);
    }

    #[tokio::test]
    async fn test_closed_channel_terminates() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let (relay, _health) = relay_for(runtime, Arc::new(RecordingSink::default()));

        drop(message_tx);
        let reason = run_bounded(relay).await;

        assert!(matches!(reason, RelayError::ChannelClosed));
        drop(error_tx);
    }

    #[tokio::test]
    async fn test_error_reported_after_channel_closes() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let (relay, _health) = relay_for(runtime, Arc::new(RecordingSink::default()));

        error_tx
            .send(Err(RuntimeError::NotFound("events".to_string())))
            .unwrap();
        drop(message_tx);
        let reason = run_bounded(relay).await;

        assert!(matches!(reason, RelayError::Stream(_)));
    }

    #[tokio::test]
    async fn test_subscribe_failure_terminates() {
        let (relay, health) = relay_for(MockRuntime::default(), Arc::new(RecordingSink::default()));

        let reason = run_bounded(relay).await;

        assert!(matches!(reason, RelayError::Subscribe(_)));
        assert_eq!(
            health.status(components::EVENT_RELAY).await,
            Some(ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_events_forwarded_in_order() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let sink = Arc::new(RecordingSink::default());
        let (relay, _health) = relay_for(runtime, sink.clone());

        for action in ["create", "start", "die"] {
            message_tx
                .send(json!({"Type": "container", "Action": action}))
                .await
                .unwrap();
        }
        drop(message_tx);
        let reason = run_bounded(relay).await;
        drop(error_tx);

        assert!(matches!(reason, RelayError::ChannelClosed));
        let actions: Vec<_> = sink
            .payloads()
            .into_iter()
            .map(|payload| match payload {
                Payload::Event(event) => event["Action"].as_str().unwrap_or_default().to_string(),
                other => panic!("unexpected payload: {:?}", other),
            })
            .collect();
        assert_eq!(actions, vec!["create", "start", "die"]);
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_relaying() {
        let (runtime, message_tx, error_tx) = MockRuntime::default().with_events();
        let sink = Arc::new(RecordingSink::failing());
        let (relay, _health) = relay_for(runtime, sink.clone());

        message_tx.send(json!({"Action": "start"})).await.unwrap();
        message_tx.send(json!({"Action": "stop"})).await.unwrap();
        drop(message_tx);
        let reason = run_bounded(relay).await;
        drop(error_tx);

        assert!(matches!(reason, RelayError::ChannelClosed));
        assert_eq!(sink.payloads().len(), 2);
    }
}
