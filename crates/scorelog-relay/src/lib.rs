//! Telemetry relay worker.
//!
//! Obtains a private channel from the supervising process, reads score
//! events from it and hands each one to every registered handler:
//!
//! 1. [`establish`](scorelog_transport::establish) a channel pair
//! 2. [`register`] the peer endpoint with the supervisor under the startup barrier
//! 3. wait for the acknowledgment, then [`Relay::run`] the read/dispatch loop
//! 4. fan each decoded event out through the [`HandlerRegistry`]
//!
//! [`run_worker`] ties the steps together with the worker exit contract.

pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod handler;
#[cfg(unix)]
pub mod handshake;
#[cfg(unix)]
pub mod relay;
#[cfg(unix)]
pub mod worker;

pub use command::CommandHandler;
pub use config::RelayConfig;
pub use control::{ControlCommand, ControlReply, LogPipeType, MAX_CONTROL_MESSAGE};
pub use error::{RelayError, Result};
pub use handler::{DispatchReport, FnHandler, HandlerError, HandlerRegistry, ScoreHandler};
#[cfg(unix)]
pub use handshake::{accept_registration, acknowledge, read_reply, register, PendingRegistration};
#[cfg(unix)]
pub use relay::{Relay, RelayState, RelayStats};
#[cfg(unix)]
pub use worker::{run_worker, WorkerExit};
