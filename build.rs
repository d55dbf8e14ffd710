use std::process::Command;

/// Embeds the short commit hash shown in the startup banner.
fn main() {
    let git_sha = std::env::var("PASTABOT_GIT_SHA")
        .ok()
        .or_else(|| {
            Command::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .output()
                .ok()
                .filter(|o| o.status.success())
                .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        })
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo:rustc-env=GIT_SHA={git_sha}");
    println!("cargo:rerun-if-env-changed=PASTABOT_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
