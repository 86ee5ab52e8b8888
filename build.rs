//! Stamps `BuildInfo` with build time, commit and compiler

use std::process::Command;

fn main() {
    let build_time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

    emit("BUILD_TIME", Some(build_time));
    emit("GIT_HASH", stdout_of("git", &["rev-parse", "--short", "HEAD"]));
    emit("RUST_VERSION", stdout_of(&rustc, &["--version"]));

    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn emit(name: &str, value: Option<String>) {
    let value = value.unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env={}={}", name, value);
}

/// Trimmed stdout of a successful command
fn stdout_of(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|out| out.trim().to_string())
}
