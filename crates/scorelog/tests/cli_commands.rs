#![cfg(all(unix, feature = "cli"))]

use std::process::Command;

use bytes::BytesMut;
use scorelog_frame::{encode_score_event, ScoreEvent};

fn scorelog() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scorelog"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn encode_then_decode_returns_the_event() {
    let encoded = scorelog()
        .args(["--format", "pretty", "encode", "--score", "7.5", "--required", "15"])
        .args(["--settings-id", "3", "--symbol", "11:2", "--symbol", "12:5.5"])
        .output()
        .expect("encode should run");
    assert!(encoded.status.success());
    let hex = String::from_utf8_lossy(&encoded.stdout).trim().to_string();
    assert_eq!(hex.len(), (24 + 2 * 12) * 2);

    let decoded = scorelog()
        .args(["--format", "json", "decode", &hex])
        .output()
        .expect("decode should run");
    assert!(decoded.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&decoded.stdout).expect("decode output should be json");
    assert_eq!(value["score"], 7.5);
    assert_eq!(value["required_score"], 15.0);
    assert_eq!(value["settings_id"], 3);
    assert_eq!(value["symbol_results"][0]["id"], 11);
    assert_eq!(value["symbol_results"][1]["score"], 5.5);
}

#[test]
fn encode_json_reports_size() {
    let output = scorelog()
        .args(["--format", "json", "encode", "--score", "1", "--required", "2"])
        .output()
        .expect("encode should run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["size"], 24);
    assert_eq!(value["symbols"], 0);
}

#[test]
fn decode_count_mismatch_returns_60() {
    let mut wire = BytesMut::new();
    encode_score_event(
        &ScoreEvent::new(1.0, 2.0, 0)
            .with_symbol(1, 1.0)
            .with_symbol(2, 1.0),
        &mut wire,
    )
    .unwrap();
    wire[0] = 3;

    let output = scorelog()
        .args(["decode", &hex::encode(&wire)])
        .output()
        .expect("decode should run");
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid frame"));
}

#[test]
fn decode_short_input_returns_60() {
    let output = scorelog()
        .args(["decode", "0102"])
        .output()
        .expect("decode should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_bad_hex_returns_60() {
    let output = scorelog()
        .args(["decode", "zz"])
        .output()
        .expect("decode should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn encode_bad_symbol_returns_64() {
    let output = scorelog()
        .args(["encode", "--score", "1", "--required", "2", "--symbol", "nope"])
        .output()
        .expect("encode should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_extended_lists_frame_layout() {
    let output = scorelog()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: scorelog"));
    assert!(stdout.contains("frame: header=24 symbol=12 max=1024"));
    let profile = stdout
        .lines()
        .find_map(|line| line.strip_prefix("profile: "))
        .expect("profile line");
    assert!(["debug", "release"].contains(&profile), "profile: {profile}");
}
