//! Native capabilities callable from the consumer context.
//!
//! The consumer may only reach host-side actions through a fixed table built
//! up front: each entry maps a validated name to a zero-argument primary
//! action and an optional fallback. Callers never receive an error; a failed
//! invocation is logged and swallowed.

mod settings;

pub use settings::{
    CommandLauncher, OPEN_APP_SETTINGS, SettingsSurface, SurfaceLauncher,
    register_open_app_settings,
};

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use pushbridge_core::Config;

use crate::error::BridgeError;
use crate::telemetry::{self, CapabilityOutcome};

/// Failure of a single native action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0} is not available on this host")]
    Unavailable(String),

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

/// Problems detected while building the capability table.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid capability name '{0}': expected an ASCII identifier")]
    InvalidName(String),

    #[error("Capability '{0}' is already registered")]
    Duplicate(String),
}

/// A zero-argument host action.
pub trait NativeAction: Send + Sync {
    fn run(&self) -> Result<(), ActionError>;
}

impl<F> NativeAction for F
where
    F: Fn() -> Result<(), ActionError> + Send + Sync,
{
    fn run(&self) -> Result<(), ActionError> {
        self()
    }
}

struct Capability {
    primary: Box<dyn NativeAction>,
    fallback: Option<Box<dyn NativeAction>>,
}

/// Builder collecting capabilities before the table is frozen.
#[derive(Default)]
pub struct CapabilityGatewayBuilder {
    table: BTreeMap<String, Capability>,
}

impl CapabilityGatewayBuilder {
    /// Add a capability. Names must start with an ASCII letter and contain
    /// only ASCII letters, digits and `_`.
    pub fn register(
        mut self,
        name: &str,
        primary: impl NativeAction + 'static,
        fallback: Option<Box<dyn NativeAction>>,
    ) -> Result<Self, GatewayError> {
        if !is_valid_name(name) {
            return Err(GatewayError::InvalidName(name.to_string()));
        }
        if self.table.contains_key(name) {
            return Err(GatewayError::Duplicate(name.to_string()));
        }

        self.table.insert(
            name.to_string(),
            Capability {
                primary: Box::new(primary),
                fallback,
            },
        );
        debug!(capability = name, "Capability registered");
        Ok(self)
    }

    pub fn build(self) -> CapabilityGateway {
        info!(count = self.table.len(), "Capability gateway ready");
        CapabilityGateway { table: self.table }
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Frozen table of native capabilities.
pub struct CapabilityGateway {
    table: BTreeMap<String, Capability>,
}

impl CapabilityGateway {
    pub fn builder() -> CapabilityGatewayBuilder {
        CapabilityGatewayBuilder::default()
    }

    /// The host capability table: `openAppSettings` backed by the configured
    /// settings commands.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let launcher: Arc<dyn SurfaceLauncher> =
            Arc::new(CommandLauncher::from_config(&config.settings));
        Ok(register_open_app_settings(Self::builder(), launcher, &config.bridge.app_id)?.build())
    }

    /// Registered capability names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Invoke a capability by name. Never reports failure to the caller.
    pub fn invoke(&self, name: &str) {
        let outcome = match self.execute(name) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Capability invocation failed");
                CapabilityOutcome::Failed
            }
        };
        telemetry::record_capability(name, outcome);
    }

    fn execute(&self, name: &str) -> Result<CapabilityOutcome, BridgeError> {
        let Some(capability) = self.table.get(name) else {
            warn!(capability = name, "Unknown capability ignored");
            return Ok(CapabilityOutcome::Unknown);
        };

        let primary_err = match run_contained(capability.primary.as_ref()) {
            Ok(()) => {
                debug!(capability = name, "Primary action succeeded");
                return Ok(CapabilityOutcome::Primary);
            }
            Err(e) => e,
        };
        warn!(capability = name, error = %primary_err, "Primary action failed");

        let Some(fallback) = &capability.fallback else {
            return Err(BridgeError::GatewayActionFailure {
                capability: name.to_string(),
                primary: primary_err.to_string(),
                fallback: "none registered".to_string(),
            });
        };

        match run_contained(fallback.as_ref()) {
            Ok(()) => {
                info!(capability = name, "Fallback action succeeded");
                Ok(CapabilityOutcome::Fallback)
            }
            Err(fallback_err) => Err(BridgeError::GatewayActionFailure {
                capability: name.to_string(),
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}

/// Run an action, turning a panic into an ordinary failure.
fn run_contained(action: &dyn NativeAction) -> Result<(), ActionError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| action.run()))
        .unwrap_or_else(|_| Err(ActionError::Failed("native action panicked".into())))
}
