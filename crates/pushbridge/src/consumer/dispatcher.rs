//! Consumer-side half of the injection protocol.
//!
//! Decodes the injected event record and re-emits it as a named local event to
//! whoever listens inside the consumer.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use pushbridge_core::NotificationEvent;

use super::{InjectionError, ScriptCall, ScriptRuntime};

/// Event re-emitted inside the consumer, e.g. `pushNotificationReceived`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalEvent {
    pub name: String,
    pub detail: NotificationEvent,
}

/// [`ScriptRuntime`] that turns delivery calls into [`LocalEvent`]s.
pub struct LocalDispatcher {
    delivery_action: String,
    event_name: String,
    tx: broadcast::Sender<LocalEvent>,
}

impl LocalDispatcher {
    pub fn new(
        delivery_action: impl Into<String>,
        event_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            delivery_action: delivery_action.into(),
            event_name: event_name.into(),
            tx,
        }
    }

    /// Register a local listener. Listeners only see events emitted after
    /// they subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<LocalEvent> {
        self.tx.subscribe()
    }
}

impl ScriptRuntime for LocalDispatcher {
    fn invoke(&mut self, call: ScriptCall) -> Result<(), InjectionError> {
        if call.action != self.delivery_action {
            return Err(InjectionError::UnknownAction(call.action));
        }

        let detail = NotificationEvent::from_json(&call.argument)
            .map_err(|e| InjectionError::Decode(e.to_string()))?;

        let local = LocalEvent {
            name: self.event_name.clone(),
            detail,
        };
        match self.tx.send(local) {
            Ok(listeners) => debug!(event = %self.event_name, listeners, "Local event emitted"),
            Err(_) => debug!(event = %self.event_name, "Local event emitted with no listeners"),
        }
        Ok(())
    }
}
