//! Lifecycle of the consumer's single relay subscription.
//!
//! State machine:
//! ```text
//! Inactive --activate--> Active
//! Active   --activate--> Active    (deactivate, then activate)
//! Active   --deactivate--> Inactive
//! Inactive --deactivate--> Inactive
//! ```
//!
//! The registered handler never touches the script runtime itself: it posts
//! each event onto the consumer context, which is the only place injection is
//! allowed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::consumer::ConsumerHandle;
use crate::relay::{EventRelay, SubscriptionHandle};
use crate::telemetry::{self, EventOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Inactive,
    Active,
}

/// Host lifecycle signals the bridge reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The consumer context became active (foreground, resumed).
    Resumed,
    /// The consumer context became inactive.
    Paused,
    /// The consumer context is being torn down.
    Destroyed,
}

/// Binds the relay's subscriber slot to one consumer context.
pub struct BridgeSubscription {
    relay: Arc<EventRelay>,
    consumer: ConsumerHandle,
    handle: Option<SubscriptionHandle>,
}

impl BridgeSubscription {
    pub const fn new(relay: Arc<EventRelay>, consumer: ConsumerHandle) -> Self {
        Self {
            relay,
            consumer,
            handle: None,
        }
    }

    pub const fn state(&self) -> SubscriptionState {
        if self.handle.is_some() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Inactive
        }
    }

    /// Register with the relay. A second activation first drops the existing
    /// registration so that only one is ever live.
    pub fn activate(&mut self) {
        if self.handle.is_some() {
            debug!("Re-entrant activation, replacing live subscription");
            self.deactivate();
        }

        let consumer = self.consumer.clone();
        let handle = self.relay.subscribe(Box::new(move |event| {
            if let Err(e) = consumer.deliver(event) {
                warn!(error = %e, "Dropping event");
                telemetry::record_event(EventOutcome::Unavailable);
            }
        }));

        info!(subscription = handle.id(), "Bridge subscription active");
        self.handle = Some(handle);
    }

    /// Unregister from the relay. Safe to call repeatedly or before any
    /// activation.
    pub fn deactivate(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.relay.unsubscribe(handle);
            info!(subscription = handle.id(), "Bridge subscription inactive");
        }
    }

    /// Apply a host lifecycle signal.
    pub fn on_lifecycle(&mut self, event: LifecycleEvent) {
        debug!(?event, "Lifecycle event");
        match event {
            LifecycleEvent::Resumed => self.activate(),
            LifecycleEvent::Paused | LifecycleEvent::Destroyed => self.deactivate(),
        }
    }
}

impl Drop for BridgeSubscription {
    fn drop(&mut self) {
        self.deactivate();
    }
}
