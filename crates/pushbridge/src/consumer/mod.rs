//! The consumer execution context.
//!
//! The script runtime only accepts calls from one context. [`ConsumerContext`]
//! is that context: a single tokio task that exclusively owns the
//! [`ScriptRuntime`] and runs posted jobs one at a time, in the order they were
//! posted. Any thread may post through a [`ConsumerHandle`]; posting never
//! blocks.
//!
//! Events are injected as a [`ScriptCall`] whose argument is the JSON record of
//! the event. The consumer side decodes it again (see [`LocalDispatcher`]).

mod dispatcher;

pub use dispatcher::{LocalDispatcher, LocalEvent};

use std::panic::AssertUnwindSafe;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use pushbridge_core::NotificationEvent;

use crate::error::BridgeError;
use crate::telemetry::{self, EventOutcome};

/// A named action with one string argument, injected into the script runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCall {
    pub action: String,
    pub argument: String,
}

/// Reasons the script runtime can refuse an injected call.
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    #[error("Failed to encode event record: {0}")]
    Encode(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Failed to decode event record: {0}")]
    Decode(String),

    #[error("Script runtime rejected the call: {0}")]
    Rejected(String),
}

/// The script runtime living inside the consumer context.
pub trait ScriptRuntime: Send + 'static {
    /// Execute a named action. Only ever called from the consumer task.
    fn invoke(&mut self, call: ScriptCall) -> Result<(), InjectionError>;
}

enum Job {
    Deliver(NotificationEvent),
}

/// Cloneable, thread-safe entry point for posting work onto the consumer.
#[derive(Clone)]
pub struct ConsumerHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl ConsumerHandle {
    /// Marshal an event onto the consumer context for injection.
    ///
    /// Fails with [`BridgeError::DeliveryUnavailable`] once the context has
    /// been torn down.
    pub fn deliver(&self, event: NotificationEvent) -> Result<(), BridgeError> {
        self.tx.send(Job::Deliver(event)).map_err(|err| {
            let Job::Deliver(event) = err.0;
            BridgeError::DeliveryUnavailable {
                event_id: event.id().to_string(),
            }
        })
    }

    /// Whether the consumer context still accepts jobs.
    pub fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Owner of the consumer task.
pub struct ConsumerContext {
    handle: ConsumerHandle,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerContext {
    /// Start the consumer task. Must be called from within a tokio runtime.
    ///
    /// `delivery_action` is the action name used for injected events.
    pub fn spawn(runtime: impl ScriptRuntime, delivery_action: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let delivery_action = delivery_action.into();

        let task = tokio::spawn(run_consumer(
            Box::new(runtime),
            delivery_action,
            rx,
            shutdown_rx,
        ));

        Self {
            handle: ConsumerHandle { tx },
            shutdown_tx,
            task,
        }
    }

    pub fn handle(&self) -> ConsumerHandle {
        self.handle.clone()
    }

    /// Stop accepting jobs, finish the ones already posted, then drop the
    /// runtime. Deliveries attempted afterwards fail as unavailable.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Consumer task ended abnormally");
        }
    }
}

async fn run_consumer(
    mut runtime: Box<dyn ScriptRuntime>,
    delivery_action: String,
    mut rx: mpsc::UnboundedReceiver<Job>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(action = %delivery_action, "Consumer context started");

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                run_job(runtime.as_mut(), &delivery_action, job);
            }
            _ = shutdown.changed() => {
                rx.close();
                while let Some(job) = rx.recv().await {
                    run_job(runtime.as_mut(), &delivery_action, job);
                }
                break;
            }
        }
    }

    info!("Consumer context stopped");
}

fn run_job(runtime: &mut dyn ScriptRuntime, delivery_action: &str, job: Job) {
    match job {
        Job::Deliver(event) => {
            let event_id = event.id().to_string();
            match inject(runtime, delivery_action, &event) {
                Ok(()) => {
                    debug!(event_id, "Event injected into consumer");
                    telemetry::record_event(EventOutcome::Delivered);
                }
                Err(source) => {
                    let err = BridgeError::InjectionFailure { event_id, source };
                    error!(error = %err, "Dropping event");
                    telemetry::record_event(EventOutcome::InjectionFailed);
                }
            }
        }
    }
}

fn inject(
    runtime: &mut dyn ScriptRuntime,
    delivery_action: &str,
    event: &NotificationEvent,
) -> Result<(), InjectionError> {
    let argument = event
        .to_json()
        .map_err(|e| InjectionError::Encode(e.to_string()))?;
    let call = ScriptCall {
        action: delivery_action.to_string(),
        argument,
    };

    // A panicking runtime must not take the consumer task down with it.
    std::panic::catch_unwind(AssertUnwindSafe(|| runtime.invoke(call)))
        .unwrap_or_else(|_| Err(InjectionError::Rejected("script runtime panicked".into())))
}
