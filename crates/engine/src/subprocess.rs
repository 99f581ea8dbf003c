// SPDX-License-Identifier: MIT

//! Subprocess helper for providers (§5 "Subprocess helper"): runs an
//! external command with the task context wired to its output, polling
//! cancellation at a fixed short interval and escalating
//! terminate → kill → give up, matching the reference implementation's
//! `execute()` exactly.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use stevedore_core::provider::TaskContext;
use stevedore_core::EngineError;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Restores the process CWD on drop, regardless of how the scope exits.
struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> std::io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.previous);
    }
}

/// The three levels the reference implementation's `execute()` escalates
/// through: keep waiting, a graceful terminate already sent, a forced
/// kill already sent. A fourth cancellation request past `Killed` gives
/// up and returns `Ok(None)`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Escalation {
    Running,
    Terminated,
    Killed,
}

/// Runs `command` with `ctx`'s out/err sinks fed from its stdout/stderr,
/// polling `ctx.cancel_check()` every 100ms. Returns `Ok(Some(status))`
/// on normal exit, `Ok(None)` if cancellation escalated past a forced
/// kill without the process exiting, and surfaces spawn/IO failures as
/// `EngineError::IoError`.
pub async fn execute(
    ctx: &dyn TaskContext,
    mut command: Command,
    cwd: Option<&Path>,
) -> Result<Option<std::process::ExitStatus>, EngineError> {
    let _cwd_guard = match cwd {
        Some(dir) => Some(CwdGuard::enter(dir)?),
        None => None,
    };

    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn()?;
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let mut level = Escalation::Running;
    loop {
        drain(&mut stdout, |b| ctx.write_out(b)).await;
        drain(&mut stderr, |b| ctx.write_err(b)).await;

        match ctx.cancel_check() {
            Ok(()) => match tokio::time::timeout(POLL_INTERVAL, child.wait()).await {
                Ok(status) => {
                    drain(&mut stdout, |b| ctx.write_out(b)).await;
                    drain(&mut stderr, |b| ctx.write_err(b)).await;
                    return Ok(Some(status?));
                }
                Err(_elapsed) => continue,
            },
            Err(EngineError::TaskCancelled) => {
                level = match level {
                    Escalation::Running => {
                        send_signal(&child, nix::sys::signal::Signal::SIGTERM);
                        Escalation::Terminated
                    }
                    Escalation::Terminated => {
                        send_signal(&child, nix::sys::signal::Signal::SIGKILL);
                        Escalation::Killed
                    }
                    Escalation::Killed => return Ok(None),
                };
            }
            Err(other) => return Err(other),
        }
    }
}

async fn drain(stream: &mut Option<impl tokio::io::AsyncRead + Unpin>, sink: impl Fn(&[u8])) {
    let Some(s) = stream.as_mut() else { return };
    let mut buf = [0u8; 4096];
    // Best-effort, non-blocking-in-spirit drain: a single read per poll
    // tick is enough to keep sinks reasonably live without delaying
    // cancellation checks on a slow producer.
    match tokio::time::timeout(Duration::from_millis(1), s.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => sink(&buf[..n]),
        _ => {}
    }
}

fn send_signal(child: &Child, signal: nix::sys::signal::Signal) {
    if let Some(pid) = child.id() {
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(pid, signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ManualCtx {
        cancelled: AtomicBool,
    }

    impl TaskContext for ManualCtx {
        fn message(&self, _: &str) {}
        fn progress(&self, _: Option<f64>) {}
        fn progress_track(&self, _: f64) {}
        fn cancel_check(&self) -> Result<(), EngineError> {
            if self.cancelled.swap(false, Ordering::SeqCst) {
                Err(EngineError::TaskCancelled)
            } else {
                Ok(())
            }
        }
        fn write_out(&self, _: &[u8]) {}
        fn write_err(&self, _: &[u8]) {}
        fn emit(&self, _name: &str, _payload: stevedore_core::Value) {}
    }

    #[tokio::test]
    async fn runs_command_to_completion() {
        let ctx = ManualCtx {
            cancelled: AtomicBool::new(false),
        };
        let cmd = Command::new("true");
        let status = execute(&ctx, cmd, None).await.unwrap();
        assert!(status.unwrap().success());
    }

    #[tokio::test]
    async fn cancellation_terminates_a_long_running_command() {
        let ctx = ManualCtx {
            cancelled: AtomicBool::new(true),
        };
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let status = execute(&ctx, cmd, None).await.unwrap();
        assert!(status.map(|s| !s.success()).unwrap_or(true));
    }
}
