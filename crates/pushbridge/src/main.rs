//! pushbridge
//!
//! Relays push messages read from a file or stdin into a local consumer and
//! exposes the native capability table.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};

use pushbridge::source::spawn_line_source;
use pushbridge::{
    BridgeSubscription, CapabilityGateway, ConsumerContext, EventRelay, IngressAdapter,
    LifecycleEvent, LocalDispatcher, LocalEvent,
};
use pushbridge_core::config::load_config;
use pushbridge_core::tracing_init::init_tracing;

/// Local listeners lagging further than this lose the oldest events.
const LOCAL_EVENT_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "pushbridge")]
#[command(version, about = "pushbridge - push notification relay bridge")]
struct Args {
    /// Explicit config file, merged over the global one.
    #[arg(long, env = "PUSHBRIDGE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    /// Log level for the bridge crates. Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// OTLP collector endpoint for relay metrics.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "PUSHBRIDGE_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Relay NDJSON push messages to a local consumer until EOF or Ctrl-C.
    Run {
        /// Read messages from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Invoke a native capability by name.
    Invoke { name: String },
    /// List registered capability names.
    Capabilities,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.log_json {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    #[cfg(feature = "metrics")]
    let metrics_guard = match args.otlp_endpoint.as_deref() {
        Some(endpoint) => Some(pushbridge_core::metrics::init_metrics(endpoint)?),
        None => None,
    };

    info!(version = env!("CARGO_PKG_VERSION"), "Starting pushbridge");

    let result = match args.command {
        Commands::Run { input } => run(&config, input).await,
        Commands::Invoke { name } => invoke(&config, &name),
        Commands::Capabilities => list_capabilities(&config),
    };

    #[cfg(feature = "metrics")]
    shutdown_metrics(metrics_guard);

    result
}

#[cfg(feature = "metrics")]
fn shutdown_metrics(guard: Option<pushbridge_core::metrics::MetricsGuard>) {
    if let Some(guard) = guard
        && let Err(e) = guard.shutdown()
    {
        warn!(error = %e, "Metrics shutdown failed");
    }
}

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    EndOfInput,
    Signal,
}

async fn run(config: &pushbridge_core::Config, input: Option<PathBuf>) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    relay_until(config, reader, shutdown_signal()).await?;
    info!("pushbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, running until end of input");
        std::future::pending::<()>().await;
    }
}

/// Relay messages from `reader` until it is exhausted or `shutdown`
/// completes. The source thread is never joined, so a read blocked on a
/// terminal or fifo does not hold up shutdown.
async fn relay_until<R>(
    config: &pushbridge_core::Config,
    reader: R,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<StopReason>
where
    R: BufRead + Send + 'static,
{
    let relay = Arc::new(EventRelay::new());

    let dispatcher = LocalDispatcher::new(
        config.bridge.delivery_action.clone(),
        config.bridge.event_name.clone(),
        LOCAL_EVENT_CAPACITY,
    );
    let printer = tokio::spawn(print_local_events(dispatcher.subscribe()));
    let consumer = ConsumerContext::spawn(dispatcher, config.bridge.delivery_action.clone());

    let mut subscription = BridgeSubscription::new(Arc::clone(&relay), consumer.handle());
    subscription.on_lifecycle(LifecycleEvent::Resumed);

    let ingress = Arc::new(IngressAdapter::new(relay));
    let source_done = spawn_line_source(reader, ingress).context("Failed to start push source")?;

    let reason = tokio::select! {
        finished = source_done => {
            match finished {
                Ok(stats) => info!(
                    messages = stats.messages,
                    token_refreshes = stats.token_refreshes,
                    "Push source finished"
                ),
                Err(_) => warn!("Push source thread ended without reporting"),
            }
            StopReason::EndOfInput
        }
        () = shutdown => {
            info!("Received shutdown signal");
            StopReason::Signal
        }
    };

    // Deactivate before the consumer goes away so no event targets a dead
    // context.
    subscription.on_lifecycle(LifecycleEvent::Destroyed);
    consumer.shutdown().await;

    // The dispatcher was dropped with the consumer, which closes the channel.
    printer.await.context("Event printer failed")?;
    Ok(reason)
}

async fn print_local_events(mut rx: broadcast::Receiver<LocalEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = write_event(&mut std::io::stdout().lock(), &event) {
                    warn!(error = %e, "Failed to write event");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn write_event(out: &mut impl Write, event: &LocalEvent) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    out.flush()
}

fn invoke(config: &pushbridge_core::Config, name: &str) -> anyhow::Result<()> {
    let gateway = CapabilityGateway::from_config(config)?;
    if !gateway.contains(name) {
        let known: Vec<&str> = gateway.names().collect();
        anyhow::bail!("Unknown capability '{name}' (available: {})", known.join(", "));
    }
    gateway.invoke(name);
    Ok(())
}

fn list_capabilities(config: &pushbridge_core::Config) -> anyhow::Result<()> {
    let gateway = CapabilityGateway::from_config(config)?;
    let mut out = std::io::stdout().lock();
    for name in gateway.names() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
