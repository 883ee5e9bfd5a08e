//! pushbridge
//!
//! Relays push notifications from an external delivery source into a
//! single-threaded script consumer:
//! - Ingress normalization of raw push payloads
//! - Single-subscriber event relay
//! - Subscription lifecycle bound to the consumer context
//! - Consumer context and the event injection protocol
//! - Capability gateway for native actions invoked by the consumer

pub mod consumer;
pub mod error;
pub mod gateway;
pub mod ingress;
pub mod relay;
pub mod source;
pub mod subscription;
pub mod telemetry;

pub use consumer::{ConsumerContext, ConsumerHandle, LocalDispatcher, LocalEvent, ScriptRuntime};
pub use error::BridgeError;
pub use gateway::CapabilityGateway;
pub use ingress::IngressAdapter;
pub use relay::{EventRelay, PublishOutcome, SubscriptionHandle};
pub use subscription::{BridgeSubscription, LifecycleEvent, SubscriptionState};
