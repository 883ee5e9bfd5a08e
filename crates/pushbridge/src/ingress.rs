//! Ingress from the external push source.
//!
//! The push source calls in on a thread it owns and has no failure channel, so
//! every entry point here returns `()`: normalize, publish once, return. A
//! payload that cannot be normalized is logged and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, error, info, instrument};

use pushbridge_core::event::unix_millis;
use pushbridge_core::{NotificationEvent, RawPayload};

use crate::error::BridgeError;
use crate::relay::{EventRelay, PublishOutcome};
use crate::telemetry::{self, EventOutcome};

/// Normalizes raw push payloads and publishes them to the relay.
pub struct IngressAdapter {
    relay: Arc<EventRelay>,
    /// Last synthesized fallback id, to keep them strictly increasing.
    last_fallback_id: AtomicI64,
}

impl IngressAdapter {
    pub const fn new(relay: Arc<EventRelay>) -> Self {
        Self {
            relay,
            last_fallback_id: AtomicI64::new(0),
        }
    }

    /// Handle one inbound message from the push source.
    #[instrument(skip_all, fields(message_id = payload.message_id().unwrap_or("")))]
    pub fn on_external_message(&self, payload: RawPayload) {
        debug!(
            from = payload.from.as_deref().unwrap_or(""),
            has_notification = payload.notification.is_some(),
            data_entries = payload.data.len(),
            "Push message received"
        );

        match self.normalize(&payload) {
            Ok(event) => self.publish(event),
            Err(e) => {
                error!(error = %e, "Dropping push message");
                telemetry::record_event(EventOutcome::Malformed);
            }
        }
    }

    /// Handle one inbound message in its JSON text form.
    pub fn on_raw_message(&self, json: &str) {
        match RawPayload::from_json(json) {
            Ok(payload) => self.on_external_message(payload),
            Err(e) => {
                error!(error = %BridgeError::from(e), "Dropping unparseable push message");
                telemetry::record_event(EventOutcome::Malformed);
            }
        }
    }

    /// The push source rotated this device's registration token.
    pub fn on_new_token(&self, token: &str) {
        let prefix: String = token.chars().take(8).collect();
        info!(token_prefix = %prefix, "Push registration token refreshed");
    }

    /// Build a [`NotificationEvent`] from a raw payload.
    pub fn normalize(&self, payload: &RawPayload) -> Result<NotificationEvent, BridgeError> {
        let data = payload.data_entries()?;
        let id = payload
            .message_id()
            .map_or_else(|| self.fallback_id(), str::to_string);

        Ok(NotificationEvent::new(
            id,
            payload.title(),
            payload.body(),
            data,
            unix_millis(),
        )?)
    }

    fn publish(&self, event: NotificationEvent) {
        let event_id = event.id().to_string();
        match self.relay.publish(event) {
            PublishOutcome::Delivered => debug!(event_id, "Event handed to relay"),
            PublishOutcome::Dropped => debug!(event_id, "Event dropped, no consumer registered"),
        }
    }

    /// Current time in milliseconds, bumped past the previous fallback id if
    /// two messages arrive within the same millisecond.
    fn fallback_id(&self) -> String {
        let now = unix_millis();
        let prev = self
            .last_fallback_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1).to_string()
    }
}
