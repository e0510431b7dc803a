use bytes::BytesMut;
use scorelog_frame::{encode_score_event, FrameError, ScoreEvent, DEFAULT_MAX_FRAME_SIZE};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{render_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut event = ScoreEvent::new(args.score, args.required, args.settings_id);
    for raw in &args.symbols {
        let (id, score) = parse_symbol(raw)?;
        event = event.with_symbol(id, score);
    }

    let size = event.wire_size();
    if size > DEFAULT_MAX_FRAME_SIZE {
        return Err(frame_error(
            "cannot encode event",
            FrameError::FrameTooLarge {
                size,
                max: DEFAULT_MAX_FRAME_SIZE,
            },
        ));
    }

    let mut buf = BytesMut::with_capacity(size);
    encode_score_event(&event, &mut buf).map_err(|err| frame_error("cannot encode event", err))?;
    println!(
        "{}",
        render_encoded(&buf, event.symbol_results.len(), format)
    );
    Ok(SUCCESS)
}

fn parse_symbol(raw: &str) -> CliResult<(i32, f64)> {
    let (id, score) = raw
        .split_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("symbol must be ID:SCORE, got {raw}")))?;
    let id: i32 = id
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid symbol id: {id}")))?;
    let score: f64 = score
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid symbol score: {score}")))?;
    Ok((id, score))
}
