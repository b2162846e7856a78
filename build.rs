use std::process::Command;

const VERSION_ENV: &str = "KANBAN_BOARD_VERSION";

/// Strips a leading `v` from tags like `v1.2.3`.
fn normalized_version(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let version = match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|ch: char| ch.is_ascii_digit()) => rest,
        _ => trimmed,
    };
    (!version.is_empty()).then(|| version.to_string())
}

fn version_from_env() -> Option<String> {
    std::env::var(VERSION_ENV)
        .ok()
        .and_then(|value| normalized_version(&value))
}

fn version_from_git() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout)
        .ok()
        .and_then(|value| normalized_version(&value))
}

fn main() {
    println!("cargo:rerun-if-env-changed={VERSION_ENV}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/packed-refs");

    let version = version_from_env()
        .or_else(version_from_git)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    println!("cargo:rustc-env=KANBAN_BOARD_BUILD_VERSION={version}");
}
