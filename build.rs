// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CARD_SCANNER_VERSION");

    let version = std::env::var("CARD_SCANNER_VERSION")
        .ok()
        .or_else(describe_head)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` of HEAD with the tag's `v` dropped, e.g. `0.2.0-3-gabcdef1`
///
/// Outside a git checkout (crate tarballs) this is `None` and the package
/// version is used.
fn describe_head() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if described.is_empty() {
        return None;
    }
    Some(described.strip_prefix('v').unwrap_or(&described).to_string())
}
