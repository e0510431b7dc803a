use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("scorelog {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: scorelog");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SCORELOG_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("SCORELOG_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "git_hash: {}",
        option_env!("SCORELOG_GIT_HASH").unwrap_or("unknown")
    );
    println!(
        "frame: header={} symbol={} max={}",
        scorelog_frame::HEADER_SIZE,
        scorelog_frame::SYMBOL_RESULT_SIZE,
        scorelog_frame::DEFAULT_MAX_FRAME_SIZE
    );
    println!("features: relay={}, cli=true", cfg!(feature = "relay"));

    Ok(SUCCESS)
}
