use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scorelog_frame::{FrameConfig, HEADER_SIZE};
use scorelog_relay::{run_worker, CommandHandler, HandlerRegistry, RelayConfig, WorkerExit};
use scorelog_transport::{establish, ChannelEndpoint, StartupBarrier};
use tracing::{error, info, warn};

use crate::cmd::RunArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{OutputFormat, PrintHandler};

const DEFAULT_BARRIER_FILE: &str = "scorelog-startup.lock";

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_interval(&args.poll_interval)?;
    let handler_timeout = args
        .handler_timeout
        .as_deref()
        .map(parse_interval)
        .transpose()?;
    if args.max_frame_size < HEADER_SIZE {
        return Err(CliError::new(
            USAGE,
            format!("max frame size must be at least {HEADER_SIZE} bytes"),
        ));
    }
    if args.control_fd <= 2 {
        return Err(CliError::new(
            USAGE,
            format!("control descriptor {} is a standard stream", args.control_fd),
        ));
    }

    // SAFETY: the parent passed this descriptor for the control channel and
    // nothing else in this process has taken ownership of it.
    let control = unsafe { ChannelEndpoint::from_raw_inherited(args.control_fd) }.map_err(|err| {
        CliError::new(USAGE, format!("control descriptor {}: {err}", args.control_fd))
    })?;

    // Past this point every outcome exits with SUCCESS.
    let barrier_path = args.barrier_path.unwrap_or_else(default_barrier_path);
    let barrier = match StartupBarrier::open(&barrier_path) {
        Ok(barrier) => barrier,
        Err(err) => {
            error!(path = %barrier_path.display(), error = %err, "cannot open startup barrier");
            return Ok(SUCCESS);
        }
    };

    let mut registry = HandlerRegistry::new();
    if args.print {
        registry.register(PrintHandler::new(format));
    }
    for command in args.handler_cmds {
        let handler = CommandHandler::new(command);
        match handler_timeout {
            Some(limit) => registry.register(handler.with_timeout(limit)),
            None => registry.register(handler),
        };
    }
    if registry.is_empty() {
        warn!("no handlers configured, events will be decoded and dropped");
    }

    let config = RelayConfig {
        worker_name: args.name,
        frame: FrameConfig {
            max_frame_size: args.max_frame_size,
        },
        poll_interval,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(err) = install_termination_handler(shutdown.clone()) {
        error!(error = %err, "cannot install termination handler");
        return Ok(SUCCESS);
    }

    let exit = run_worker(control, &barrier, registry, config, shutdown, establish);
    if let WorkerExit::Finished(stats) = &exit {
        info!(
            frames_received = stats.frames_received,
            events_dispatched = stats.events_dispatched,
            frames_rejected = stats.frames_rejected,
            handler_failures = stats.handler_failures,
            "worker finished"
        );
    }
    Ok(exit.exit_code())
}

fn default_barrier_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_BARRIER_FILE)
}

fn install_termination_handler(shutdown: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
}

fn parse_interval(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "poll interval must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid poll interval: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "poll interval must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_millis() {
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_interval("40").unwrap(), Duration::from_millis(40));
    }

    #[test]
    fn parse_interval_seconds() {
        assert_eq!(parse_interval("2s").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_interval_invalid() {
        assert!(parse_interval("0ms").is_err());
        assert!(parse_interval("soon").is_err());
        assert_eq!(parse_interval("").unwrap_err().code, USAGE);
    }

    #[test]
    fn bad_handler_timeout_is_a_usage_error() {
        let args = RunArgs {
            control_fd: 9,
            barrier_path: None,
            max_frame_size: scorelog_frame::DEFAULT_MAX_FRAME_SIZE,
            poll_interval: "250ms".to_string(),
            name: "log_helper".to_string(),
            print: false,
            handler_cmds: Vec::new(),
            handler_timeout: Some("later".to_string()),
        };
        // Rejected before the control descriptor is touched.
        let err = run(args, OutputFormat::Json).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
