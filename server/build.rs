use std::process::Command;

// Commit shown in the startup log. Container builds have no .git, so the
// hash can be passed in through BETTY_BUILD_COMMIT instead.
fn main() {
    println!("cargo:rerun-if-env-changed=BETTY_BUILD_COMMIT");

    let commit = std::env::var("BETTY_BUILD_COMMIT")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(git_short_hash);

    if let Some(commit) = commit {
        println!("cargo:rustc-env=GIT_COMMIT_HASH={commit}");
    }
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
