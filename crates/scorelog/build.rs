use std::process::Command;

const BUILD_VARS: [(&str, &str); 2] = [
    ("TARGET", "SCORELOG_BUILD_TARGET"),
    ("PROFILE", "SCORELOG_BUILD_PROFILE"),
];

fn main() {
    for (cargo_var, exported) in BUILD_VARS {
        if let Ok(value) = std::env::var(cargo_var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={cargo_var}");
    }

    // An explicit GIT_HASH wins; source tarballs have no repository to ask.
    if let Some(hash) = std::env::var("GIT_HASH").ok().or_else(git_short_hash) {
        println!("cargo:rustc-env=SCORELOG_GIT_HASH={hash}");
    }
    println!("cargo:rerun-if-env-changed=GIT_HASH");
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
