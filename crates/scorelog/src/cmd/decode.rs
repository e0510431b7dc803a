use scorelog_frame::decode_score_event;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{render_event, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let cleaned: String = args.hex.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))?;

    let event = decode_score_event(&bytes).map_err(|err| frame_error("invalid frame", err))?;
    println!("{}", render_event(&event, format));
    Ok(SUCCESS)
}
