mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "scorelog", version, about = "Score telemetry relay worker")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "SCORELOG_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "SCORELOG_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "scorelog",
            "run",
            "--control-fd",
            "5",
            "--print",
            "--handler-cmd",
            "cat",
            "--handler-cmd",
            "true",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.control_fd, 5);
                assert!(args.print);
                assert_eq!(args.handler_cmds, vec!["cat", "true"]);
                assert_eq!(args.max_frame_size, scorelog_frame::DEFAULT_MAX_FRAME_SIZE);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_encode_with_negative_scores() {
        let cli = Cli::try_parse_from([
            "scorelog",
            "encode",
            "--score",
            "-1.5",
            "--required",
            "15",
            "--symbol",
            "-2:-0.5",
        ])
        .expect("encode args should parse");

        assert!(matches!(cli.command, Command::Encode(_)));
    }

    #[test]
    fn log_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "scorelog",
            "version",
            "--log-format",
            "compact",
            "--log-level",
            "debug",
        ])
        .expect("global log options should parse after the subcommand");
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn decode_requires_input() {
        let err = Cli::try_parse_from(["scorelog", "decode"]).expect_err("missing hex should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
