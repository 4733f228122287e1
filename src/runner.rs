use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {cmd}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Something that can set a variable in the active `azd` environment
pub trait EnvSink {
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// `azd env set KEY VALUE`
pub struct AzdEnv;

impl EnvSink for AzdEnv {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        run_capture("azd", &["env", "set", key, value])
            .with_context(|| format!("azd env set {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_capture_trims_stdout() {
        let out = run_capture("sh", &["-c", "printf '  hello \\n'"]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_run_capture_reports_stderr() {
        let err = run_capture("sh", &["-c", "echo boom >&2; exit 3"]).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_missing_command() {
        assert!(run_capture("definitely-not-a-real-binary-xyz", &[]).is_err());
        assert!(!command_exists("definitely-not-a-real-binary-xyz"));
    }
}
