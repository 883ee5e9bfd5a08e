//! Failure taxonomy of the bridge pipeline.
//!
//! Every variant is contained at the component where it occurs: the failing
//! event (or capability call) is logged and dropped, never retried, and never
//! surfaced to the push source or the consumer context.

use crate::consumer::InjectionError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The inbound payload cannot be encoded as a notification event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The consumer context was gone when the event was marshalled.
    #[error("Consumer context unavailable, dropped event {event_id}")]
    DeliveryUnavailable { event_id: String },

    /// The script runtime rejected the injected call.
    #[error("Injection of event {event_id} failed: {source}")]
    InjectionFailure {
        event_id: String,
        #[source]
        source: InjectionError,
    },

    /// Both the primary and the fallback native action failed.
    #[error("Capability {capability} failed (primary: {primary}; fallback: {fallback})")]
    GatewayActionFailure {
        capability: String,
        primary: String,
        fallback: String,
    },
}

impl From<pushbridge_core::Error> for BridgeError {
    fn from(e: pushbridge_core::Error) -> Self {
        match e {
            pushbridge_core::Error::MalformedPayload(msg) => Self::MalformedPayload(msg),
            other => Self::MalformedPayload(other.to_string()),
        }
    }
}
