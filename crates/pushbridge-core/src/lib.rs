//! `pushbridge` Core Library
//!
//! Shared functionality for the push-notification bridge:
//! - Normalized notification events and their JSON wire form
//! - Raw ingress payload model
//! - Configuration resolution and hierarchy
//! - Tracing initialization
//! - Common error types

pub mod config;
pub mod error;
pub mod event;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod payload;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use event::NotificationEvent;
pub use payload::{RawNotification, RawPayload};
