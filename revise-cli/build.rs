use std::path::PathBuf;
use std::process::Command;

/// Stamp the short git revision into `REVISE_BUILD_SHA` for `revise --version`.
fn main() {
    let workspace = std::env::var("CARGO_MANIFEST_DIR")
        .map(|dir| PathBuf::from(dir).join(".."))
        .unwrap_or_else(|_| PathBuf::from(".."));

    let sha = git_short_sha(&workspace).unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rerun-if-changed={}", workspace.join(".git/HEAD").display());
    println!("cargo:rustc-env=REVISE_BUILD_SHA={sha}");
}

fn git_short_sha(workspace: &PathBuf) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}
