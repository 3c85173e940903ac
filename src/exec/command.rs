// src/exec/command.rs

//! Shell command helpers for command-driven actions (lint commands, style
//! compilers, notifier hooks).

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Build a shell command appropriate for the platform.
fn shell(cmd: &str, cwd: &Path) -> Command {
    let mut c = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    c.current_dir(cwd).kill_on_drop(true);
    c
}

/// Run `cmd` through the shell, streaming its stdout (info) and stderr
/// (warn) into the log under `label`. Non-zero exit is an error.
pub async fn run_shell(label: &str, cmd: &str, cwd: &Path) -> Result<()> {
    info!(task = %label, cmd = %cmd, "running command");

    let mut child = shell(cmd, cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning `{cmd}` for '{label}'"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_label = label.to_string();
    let out = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %out_label, "{}", line);
            }
        }
    });

    // Always consume stderr so buffers don't fill.
    let err_label = label.to_string();
    let err = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(task = %err_label, "{}", line);
            }
        }
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{cmd}`"))?;
    let _ = out.await;
    let _ = err.await;

    if !status.success() {
        bail!(
            "command `{}` exited with status {}",
            cmd,
            status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string())
        );
    }
    debug!(task = %label, "command succeeded");
    Ok(())
}

/// Run `cmd` and return its stdout. Stderr is logged; non-zero exit is an
/// error carrying the stderr text.
pub async fn run_shell_capture(cmd: &str, cwd: &Path) -> Result<String> {
    let output = shell(cmd, cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("spawning `{cmd}`"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        bail!("command `{}` failed: {}", cmd, stderr.trim());
    }
    for line in stderr.lines() {
        warn!(cmd = %cmd, "{}", line);
    }

    String::from_utf8(output.stdout).with_context(|| format!("`{cmd}` wrote invalid UTF-8"))
}

/// Quote `arg` for `sh -c`.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_leaves_plain_paths_alone() {
        assert_eq!(shell_quote("static/css/main.css"), "static/css/main.css");
        assert_eq!(shell_quote("it's here"), r"'it'\''s here'");
        assert_eq!(shell_quote(""), "''");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn capture_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell_capture("printf 'a{}'", dir.path()).await.unwrap();
        assert_eq!(out, "a{}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_shell("lint", "exit 3", dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("status 3"), "{err}");
    }
}
