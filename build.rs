//! Stamps `stroi-monitor --version` with the commit and build date.
//!
//! Source tarballs have no `.git`; packagers can pass the commit through
//! `STROI_BUILD_COMMIT` instead.

use std::process::Command;

const COMMIT_OVERRIDE: &str = "STROI_BUILD_COMMIT";

fn short_commit() -> Option<String> {
    if let Ok(commit) = std::env::var(COMMIT_OVERRIDE) {
        let commit = commit.trim().to_string();
        return (!commit.is_empty()).then_some(commit);
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short=9", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8(output.stdout).ok()?;
    Some(commit.trim().to_string()).filter(|c| !c.is_empty())
}

fn main() {
    let commit = short_commit().unwrap_or_else(|| "unknown".to_string());
    let built = chrono::Utc::now().date_naive();

    println!("cargo:rustc-env=GIT_COMMIT={commit}");
    println!("cargo:rustc-env=BUILD_DATE={built}");

    println!("cargo:rerun-if-env-changed={COMMIT_OVERRIDE}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    if let Some(branch) = std::fs::read_to_string(".git/HEAD")
        .ok()
        .and_then(|head| head.trim().strip_prefix("ref: ").map(str::to_string))
    {
        println!("cargo:rerun-if-changed=.git/{branch}");
    }
}
