use std::fmt;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scorelog_frame::{FrameError, FrameReader};
use scorelog_transport::{wait_readable, ChannelEndpoint, ChannelPair, StartupBarrier};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;
use crate::control::ControlReply;
use crate::error::{RelayError, Result};
use crate::handler::HandlerRegistry;
use crate::handshake::{read_reply, register, PendingRegistration};

/// Lifecycle of a [`Relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    NotStarted,
    WaitingForRegistration,
    Running,
    Stopped,
}

impl RelayState {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::NotStarted => "not_started",
            RelayState::WaitingForRegistration => "waiting_for_registration",
            RelayState::Running => "running",
            RelayState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Frames read from the telemetry channel, valid or not.
    pub frames_received: u64,
    /// Frames that decoded and were handed to the registry.
    pub events_dispatched: u64,
    /// Frames dropped as malformed.
    pub frames_rejected: u64,
    /// Handler invocations that failed or panicked.
    pub handler_failures: u64,
}

/// Single-threaded read/dispatch loop for one telemetry channel.
///
/// Drive it with [`Relay::start`] followed by [`Relay::run`]. The loop
/// waits for the supervisor's acknowledgment, then reads one frame per
/// readiness notification and fans each decoded event out to the registry.
/// It ends on peer closure, on a permanent read error, or when the shared
/// shutdown flag is set.
pub struct Relay {
    control: ChannelEndpoint,
    registry: HandlerRegistry,
    config: RelayConfig,
    shutdown: Arc<AtomicBool>,
    state: RelayState,
    stats: RelayStats,
    pending: Option<PendingRegistration>,
    retained: Option<ChannelEndpoint>,
    channel: Option<FrameReader>,
}

impl Relay {
    pub fn new(
        control: ChannelEndpoint,
        registry: HandlerRegistry,
        config: RelayConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            control,
            registry,
            config,
            shutdown,
            state: RelayState::NotStarted,
            stats: RelayStats::default(),
            pending: None,
            retained: None,
            channel: None,
        }
    }

    /// Register the peer side of `pair` with the supervisor and keep the
    /// local side for reading.
    pub fn start(&mut self, pair: ChannelPair, barrier: &StartupBarrier) -> Result<()> {
        if self.state != RelayState::NotStarted {
            return Err(RelayError::InvalidState(format!(
                "start called in state {}",
                self.state
            )));
        }

        let pending = register(&self.control, pair.peer, barrier)?;
        self.pending = Some(pending);
        self.retained = Some(pair.local);
        self.state = RelayState::WaitingForRegistration;
        debug!(worker = %self.config.worker_name, "waiting for registration acknowledgment");
        Ok(())
    }

    /// Run until the relay stops and return the run's counters.
    pub fn run(&mut self) -> Result<RelayStats> {
        if self.state == RelayState::NotStarted {
            return Err(RelayError::InvalidState(
                "run called before start".to_string(),
            ));
        }

        while self.state != RelayState::Stopped {
            if self.shutdown.load(Ordering::SeqCst) {
                self.stop("termination requested");
                break;
            }
            match self.state {
                RelayState::WaitingForRegistration => self.poll_control(),
                RelayState::Running => self.poll_channel(),
                RelayState::NotStarted | RelayState::Stopped => break,
            }
        }

        Ok(self.stats)
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handle to the flag that ends the loop.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn poll_control(&mut self) {
        let readiness = match wait_readable(self.control.as_fd(), Some(self.config.poll_interval)) {
            Ok(Some(readiness)) => readiness,
            Ok(None) => return,
            Err(err) => {
                error!(error = %err, "cannot wait on control channel");
                self.stop("control channel error");
                return;
            }
        };
        if readiness.is_dead() {
            self.stop("control channel closed before acknowledgment");
            return;
        }

        match read_reply(&self.control) {
            Ok(reply) => self.on_reply(&reply),
            Err(RelayError::Disconnected(_)) => {
                self.stop("control channel closed before acknowledgment")
            }
            Err(err @ (RelayError::Json(_) | RelayError::ProtocolViolation(_))) => {
                warn!(error = %err, "ignoring unexpected control message");
            }
            Err(err) if err.is_transient() => {
                trace!(error = %err, "transient control read error");
            }
            Err(err) => {
                error!(error = %err, "cannot read control channel");
                self.stop("control channel error");
            }
        }
    }

    fn on_reply(&mut self, reply: &ControlReply) {
        let Some(pending) = self.pending.take() else {
            debug!(?reply, "ignoring reply with no registration pending");
            return;
        };

        match pending.complete(reply) {
            Ok(()) => match self.retained.take() {
                Some(endpoint) => {
                    info!(
                        worker = %self.config.worker_name,
                        mode = %endpoint.mode(),
                        "telemetry channel registered"
                    );
                    self.channel = Some(FrameReader::with_config(endpoint, self.config.frame));
                    self.state = RelayState::Running;
                }
                None => self.stop("no retained endpoint"),
            },
            Err(err) => {
                error!(error = %err, "telemetry channel registration failed");
                self.stop("registration refused");
            }
        }
    }

    fn poll_channel(&mut self) {
        let Some(reader) = self.channel.as_ref() else {
            self.stop("no telemetry channel");
            return;
        };

        match wait_readable(reader.as_fd(), Some(self.config.poll_interval)) {
            Ok(Some(readiness)) if readiness.is_dead() => self.stop("telemetry channel closed"),
            Ok(Some(_)) => self.read_cycle(),
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "cannot wait on telemetry channel");
                self.stop("telemetry channel error");
            }
        }
    }

    /// Read one frame, decode it and dispatch it.
    fn read_cycle(&mut self) {
        let Some(reader) = self.channel.as_mut() else {
            return;
        };

        match reader.read_event() {
            Ok(event) => {
                self.stats.frames_received += 1;
                trace!(
                    score = event.score,
                    symbols = event.symbol_results.len(),
                    "dispatching score event"
                );
                let report = self.registry.dispatch(&event, &self.config);
                self.stats.events_dispatched += 1;
                self.stats.handler_failures += report.failed as u64;
            }
            Err(err) if err.is_malformed() => {
                self.stats.frames_received += 1;
                self.stats.frames_rejected += 1;
                warn!(error = %err, "dropping invalid score frame");
            }
            Err(FrameError::ConnectionClosed) => self.stop("telemetry channel closed"),
            Err(err) if err.is_transient() => {
                debug!(error = %err, "transient telemetry read error");
            }
            Err(err) => {
                error!(error = %err, "cannot read telemetry channel");
                self.stop("telemetry channel error");
            }
        }
    }

    fn stop(&mut self, reason: &str) {
        if self.state == RelayState::Stopped {
            return;
        }
        self.state = RelayState::Stopped;
        self.channel = None;
        self.retained = None;
        self.pending = None;
        info!(
            worker = %self.config.worker_name,
            reason,
            frames_received = self.stats.frames_received,
            events_dispatched = self.stats.events_dispatched,
            frames_rejected = self.stats.frames_rejected,
            handler_failures = self.stats.handler_failures,
            "relay stopped"
        );
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("handlers", &self.registry)
            .finish_non_exhaustive()
    }
}
