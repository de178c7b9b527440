use std::env;
use std::process::Command;

use time::OffsetDateTime;

/// Stamps `STREAM_HUB_BUILD_INFO` ("<short sha> <date>") for `--version`.
fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    let built = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
        .date();

    println!("cargo:rustc-env=STREAM_HUB_BUILD_INFO={revision} {built}");
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    let sha = String::from_utf8(output.stdout).ok()?;
    let sha = sha.trim();
    (output.status.success() && !sha.is_empty()).then(|| sha.to_string())
}
