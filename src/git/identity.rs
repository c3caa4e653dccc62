use std::process::Command;
use tracing::debug;

/// Author identity used to filter commits: an explicit name wins, otherwise
/// the global git `user.name`. `None` when neither is set.
pub fn resolve_author(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(global_user_name)
}

fn global_user_name() -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--global", "user.name"])
        .output()
        .map_err(|e| debug!(error = %e, "git not available for identity lookup"))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!name.is_empty()).then_some(name)
}
