//! Pipeline counters.
//!
//! Recording compiles to a no-op unless the `metrics` feature is enabled, in
//! which case measurements go to the global `OpenTelemetry` meter provider.

#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "metrics")]
use pushbridge_core::metrics::RelayInstruments;

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Published,
    Delivered,
    Dropped,
    Malformed,
    Unavailable,
    InjectionFailed,
}

impl EventOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Delivered => "delivered",
            Self::Dropped => "dropped",
            Self::Malformed => "malformed",
            Self::Unavailable => "unavailable",
            Self::InjectionFailed => "injection_failed",
        }
    }
}

/// How a capability invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityOutcome {
    Primary,
    Fallback,
    Failed,
    Unknown,
}

impl CapabilityOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(feature = "metrics")]
fn instruments() -> &'static RelayInstruments {
    static INSTRUMENTS: OnceLock<RelayInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(RelayInstruments::from_global)
}

pub fn record_event(outcome: EventOutcome) {
    #[cfg(feature = "metrics")]
    instruments().record_event(outcome.as_str());
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

pub fn record_capability(capability: &str, outcome: CapabilityOutcome) {
    #[cfg(feature = "metrics")]
    instruments().record_capability(capability, outcome.as_str());
    #[cfg(not(feature = "metrics"))]
    let _ = (capability, outcome);
}
