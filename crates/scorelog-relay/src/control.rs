use serde::{Deserialize, Serialize};

/// Largest control message, in bytes, either side will read.
pub const MAX_CONTROL_MESSAGE: usize = 4096;

/// Kind of log pipe a worker asks the supervisor to wire up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogPipeType {
    /// Per-message score and symbol results.
    Symbols,
}

/// Command sent by a worker to the supervising process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Register the attached descriptor as a telemetry channel.
    LogPipe { pipe_type: LogPipeType },
}

impl ControlCommand {
    /// The telemetry channel registration sent by the relay worker.
    pub fn telemetry_channel() -> Self {
        ControlCommand::LogPipe {
            pipe_type: LogPipeType::Symbols,
        }
    }
}

/// Reply sent by the supervising process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    /// Outcome of a log pipe registration. Zero means accepted.
    LogPipe { status: i32 },
}

impl ControlReply {
    /// Registration accepted.
    pub fn accepted() -> Self {
        ControlReply::LogPipe { status: 0 }
    }

    /// Registration refused with a non-zero status.
    pub fn refused(status: i32) -> Self {
        ControlReply::LogPipe { status }
    }

    /// Status code carried by the reply.
    pub fn status(&self) -> i32 {
        match self {
            ControlReply::LogPipe { status } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == 0
    }
}
