use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use scorelog_transport::{ChannelEndpoint, ChannelPair, StartupBarrier};
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::handler::HandlerRegistry;
use crate::relay::{Relay, RelayStats};

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The relay ran and stopped normally.
    Finished(RelayStats),
    /// No channel pair could be created; nothing was registered.
    ChannelUnavailable,
    /// The registration command could not be sent.
    RegistrationFailed,
}

impl WorkerExit {
    /// Process exit status for this outcome.
    ///
    /// Always zero, including when no channel could be created, so the
    /// supervisor does not respawn the worker.
    pub fn exit_code(&self) -> i32 {
        0
    }

    pub fn stats(&self) -> Option<RelayStats> {
        match self {
            WorkerExit::Finished(stats) => Some(*stats),
            WorkerExit::ChannelUnavailable | WorkerExit::RegistrationFailed => None,
        }
    }
}

/// Run one relay worker from channel creation to shutdown.
///
/// `establish` creates the channel pair; production callers pass
/// [`scorelog_transport::establish`].
pub fn run_worker<F>(
    control: ChannelEndpoint,
    barrier: &StartupBarrier,
    registry: HandlerRegistry,
    config: RelayConfig,
    shutdown: Arc<AtomicBool>,
    establish: F,
) -> WorkerExit
where
    F: FnOnce() -> scorelog_transport::Result<ChannelPair>,
{
    let pair = match establish() {
        Ok(pair) => pair,
        Err(err) => {
            error!(error = %err, "cannot create channel pair, exiting now");
            return WorkerExit::ChannelUnavailable;
        }
    };

    info!(
        worker = %config.worker_name,
        mode = %pair.mode(),
        handlers = registry.len(),
        "starting relay worker"
    );

    let mut relay = Relay::new(control, registry, config, shutdown);
    if let Err(err) = relay.start(pair, barrier) {
        error!(error = %err, "cannot register telemetry channel");
        return WorkerExit::RegistrationFailed;
    }

    match relay.run() {
        Ok(stats) => WorkerExit::Finished(stats),
        Err(err) => {
            error!(error = %err, "relay failed");
            WorkerExit::Finished(relay.stats())
        }
    }
}
