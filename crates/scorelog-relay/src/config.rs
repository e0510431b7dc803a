use std::time::Duration;

use scorelog_frame::FrameConfig;

/// Default interval at which the loop wakes up to check for termination.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Worker-wide configuration, also handed to every handler invocation.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Worker name used in logs.
    pub worker_name: String,
    /// Frame size limits for the telemetry channel.
    pub frame: FrameConfig,
    /// Upper bound on a single readiness wait.
    pub poll_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            worker_name: "log_helper".to_string(),
            frame: FrameConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
