//! Facts about the user's git repository, used as defaults for pipelines

use copilot_common::repository::parse_remotes;
use eyre::{eyre, WrapErr};
use std::path::Path;
use std::process::Command;

fn git(dir: &Path, args: &[&str]) -> eyre::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .wrap_err("Failed to run git, is it installed?")?;

    if !output.status.success() {
        return Err(eyre!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Unique fetch URLs of the remotes
pub(crate) fn remotes(dir: &Path) -> eyre::Result<Vec<String>> {
    Ok(parse_remotes(&git(dir, &["remote", "-v"])?))
}

pub(crate) fn current_branch(dir: &Path) -> eyre::Result<String> {
    let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(branch.trim().to_string())
}
