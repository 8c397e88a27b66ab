//! Process registry and lifecycle management.
//!
//! The `ProcessRegistry` maps a script path to the handle of the process last started for
//! it. Handles are polled without blocking; once an exit is seen the OS handle is released
//! and only the exit code is kept, so a long session holds at most one small record per
//! listed script. Stopping is graceful first (SIGTERM to the process group, CTRL_BREAK on
//! Windows) and escalates to a forced kill once the stop deadline passes.

use std::collections::HashMap;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::error::ScriptError;
use crate::launcher::{self, Interpreter, LaunchSettings};

/// What starting a script that already has a live process does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RestartPolicy {
    /// Stop the running process, then start a new one.
    Restart,
    /// Refuse with `ScriptError::AlreadyRunning`.
    Refuse,
    /// Start a new process and leave the old one running, unmanaged.
    Detach,
}

/// Result of a non-blocking liveness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    Exited(Option<i32>),
}

/// Immediate result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// The terminate signal was sent; the outcome is reported by a later poll.
    Signalled,
    /// Nothing to do, the process had already exited.
    AlreadyExited(Option<i32>),
}

/// Final result of stopping a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    AlreadyExited(Option<i32>),
    /// Exited within the grace period.
    Exited(Option<i32>),
    /// Ignored the terminate signal and was force-killed.
    Killed(Option<i32>),
}

impl StopOutcome {
    pub fn code(&self) -> Option<i32> {
        match self {
            StopOutcome::AlreadyExited(code)
            | StopOutcome::Exited(code)
            | StopOutcome::Killed(code) => *code,
        }
    }
}

/// A state change noticed while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Exited on its own.
    Exited(Option<i32>),
    /// Finished after a stop request.
    Stopped(StopOutcome),
}

/// What happened to a previously registered live process on `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    Restarted { pid: Option<u32>, outcome: StopOutcome },
    Detached { pid: Option<u32> },
}

#[derive(Debug)]
pub struct StartReport {
    pub pid: Option<u32>,
    pub interpreter: Interpreter,
    pub replaced: Option<Replaced>,
}

/// Registry record for one script.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Option<tokio::process::Child>,
    pub pid: Option<u32>,
    pub started_at: Instant,
    pub exit: Option<ExitInfo>,
    stop_deadline: Option<tokio::time::Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub at: Instant,
}

impl ProcessHandle {
    fn new(child: tokio::process::Child, pid: Option<u32>) -> Self {
        Self {
            child: Some(child),
            pid,
            started_at: Instant::now(),
            exit: None,
            stop_deadline: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.child.is_some()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_deadline.is_some()
    }

    /// Polls the child. Returns the exit code the first time an exit is observed.
    fn poll_exit(&mut self) -> Option<Option<i32>> {
        let polled = self.child.as_mut()?.try_wait();
        self.record_poll(polled)
    }

    fn record_poll(&mut self, polled: std::io::Result<Option<ExitStatus>>) -> Option<Option<i32>> {
        let code = match polled {
            Ok(Some(status)) => status.code(),
            Ok(None) => return None,
            Err(err) => {
                // The child stays owned; the next poll tries again.
                tracing::warn!(pid = self.pid, error = %err, "liveness poll failed");
                return None;
            }
        };
        self.mark_exited(code);
        Some(code)
    }

    fn liveness(&mut self) -> Liveness {
        self.poll_exit();
        match self.exit {
            Some(exit) => Liveness::Exited(exit.code),
            None => Liveness::Running,
        }
    }

    fn mark_exited(&mut self, code: Option<i32>) {
        self.child = None;
        self.stop_deadline = None;
        self.exit = Some(ExitInfo {
            code,
            at: Instant::now(),
        });
    }
}

/// Owns every process started for a script.
pub struct ProcessRegistry {
    handles: HashMap<String, ProcessHandle>,
    launch: LaunchSettings,
    policy: RestartPolicy,
    stop_timeout: Duration,
}

impl ProcessRegistry {
    pub fn new(launch: LaunchSettings, policy: RestartPolicy, stop_timeout: Duration) -> Self {
        Self {
            handles: HashMap::new(),
            launch,
            policy,
            stop_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handles.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&ProcessHandle> {
        self.handles.get(path)
    }

    pub fn is_running(&mut self, path: &str) -> bool {
        self.handles
            .get_mut(path)
            .map(|h| h.liveness() == Liveness::Running)
            .unwrap_or(false)
    }

    /// Launches `path` and registers it, applying the restart policy to a live predecessor.
    pub async fn start(&mut self, path: &str) -> Result<StartReport> {
        let live_pid = match self.handles.get_mut(path) {
            Some(handle) => (handle.liveness() == Liveness::Running).then_some(handle.pid),
            None => None,
        };

        let mut replaced = None;
        if let Some(pid) = live_pid {
            match self.policy {
                RestartPolicy::Refuse => {
                    return Err(ScriptError::AlreadyRunning {
                        path: path.to_string(),
                        pid: pid.unwrap_or(0),
                    }
                    .into());
                }
                RestartPolicy::Restart => {
                    let timeout = self.stop_timeout;
                    let outcome = self.stop_and_wait(path, timeout).await?;
                    replaced = Some(Replaced::Restarted { pid, outcome });
                }
                RestartPolicy::Detach => {
                    replaced = Some(Replaced::Detached { pid });
                }
            }
        }

        let launched = launcher::launch(path, &self.launch)?;
        let previous = self
            .handles
            .insert(path.to_string(), ProcessHandle::new(launched.child, launched.pid));
        if let (Some(Replaced::Detached { pid }), Some(previous)) = (replaced, previous) {
            // Dropping the handle leaves the process running.
            tracing::warn!(path, pid, "previous process detached without being stopped");
            drop(previous);
        }
        Ok(StartReport {
            pid: launched.pid,
            interpreter: launched.interpreter,
            replaced,
        })
    }

    /// Non-blocking liveness poll for one script.
    pub fn poll(&mut self, path: &str) -> Result<Liveness> {
        let handle = self
            .handles
            .get_mut(path)
            .ok_or_else(|| ScriptError::not_started(path))?;
        Ok(handle.liveness())
    }

    /// Polls every handle and returns the exits observed by this call.
    pub fn poll_all(&mut self) -> Vec<(String, Transition)> {
        let mut transitions = Vec::new();
        for (path, handle) in self.handles.iter_mut() {
            let stopping = handle.is_stopping();
            if let Some(code) = handle.poll_exit() {
                let transition = if stopping {
                    Transition::Stopped(StopOutcome::Exited(code))
                } else {
                    Transition::Exited(code)
                };
                tracing::info!(path = %path, code, stopping, "script exited");
                transitions.push((path.clone(), transition));
            }
        }
        transitions
    }

    /// Paths whose process is no longer alive.
    pub fn exited_paths(&self) -> Vec<String> {
        self.handles
            .iter()
            .filter(|(_, h)| !h.is_alive())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Requests graceful termination of `path`.
    ///
    /// The process gets `stop_timeout` to exit before `enforce_stop_deadlines` kills it.
    pub fn stop(&mut self, path: &str) -> Result<StopRequest> {
        let stop_timeout = self.stop_timeout;
        let handle = self
            .handles
            .get_mut(path)
            .ok_or_else(|| ScriptError::not_started(path))?;
        if let Liveness::Exited(code) = handle.liveness() {
            return Ok(StopRequest::AlreadyExited(code));
        }
        if handle.stop_deadline.is_none() {
            handle.stop_deadline = Some(tokio::time::Instant::now() + stop_timeout);
            if let Some(pid) = handle.pid {
                send_terminate(pid);
            }
            tracing::info!(path, pid = handle.pid, "stop requested");
        }
        Ok(StopRequest::Signalled)
    }

    /// Force-kills every stopping process whose grace period has run out.
    pub async fn enforce_stop_deadlines(&mut self) -> Vec<(String, Transition)> {
        let now = tokio::time::Instant::now();
        let overdue: Vec<String> = self
            .handles
            .iter()
            .filter(|(_, h)| h.is_alive() && h.stop_deadline.map(|d| now >= d).unwrap_or(false))
            .map(|(path, _)| path.clone())
            .collect();
        let mut transitions = Vec::new();
        for path in overdue {
            let Some(handle) = self.handles.get_mut(&path) else {
                continue;
            };
            if let Some(code) = handle.poll_exit() {
                transitions.push((path, Transition::Stopped(StopOutcome::Exited(code))));
                continue;
            }
            let Some(mut child) = handle.child.take() else {
                continue;
            };
            let code = match force_kill(&mut child, handle.pid).await {
                Ok(status) => status.code(),
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "forced kill failed");
                    None
                }
            };
            handle.mark_exited(code);
            tracing::warn!(path = %path, pid = handle.pid, "script ignored terminate, killed");
            transitions.push((path, Transition::Stopped(StopOutcome::Killed(code))));
        }
        transitions
    }

    /// Signals `path`, waits up to `timeout` for it to exit, then kills it.
    pub async fn stop_and_wait(&mut self, path: &str, timeout: Duration) -> Result<StopOutcome> {
        let handle = self
            .handles
            .get_mut(path)
            .ok_or_else(|| ScriptError::not_started(path))?;
        if let Liveness::Exited(code) = handle.liveness() {
            return Ok(StopOutcome::AlreadyExited(code));
        }
        let Some(mut child) = handle.child.take() else {
            return Ok(StopOutcome::AlreadyExited(None));
        };
        if let Some(pid) = handle.pid {
            send_terminate(pid);
        }
        let outcome = match wait_for_exit(&mut child, timeout).await {
            Ok(Some(status)) => StopOutcome::Exited(status.code()),
            Ok(None) => {
                let status = force_kill(&mut child, handle.pid)
                    .await
                    .with_context(|| format!("failed to kill {}", path))?;
                StopOutcome::Killed(status.code())
            }
            Err(err) => {
                handle.child = Some(child);
                return Err(err).with_context(|| format!("failed to wait for {}", path));
            }
        };
        handle.mark_exited(outcome.code());
        tracing::info!(path, ?outcome, "script stopped");
        Ok(outcome)
    }

    /// Waits for `path` to exit on its own.
    pub async fn wait(&mut self, path: &str) -> Result<Option<i32>> {
        let handle = self
            .handles
            .get_mut(path)
            .ok_or_else(|| ScriptError::not_started(path))?;
        if let Some(exit) = handle.exit {
            return Ok(exit.code);
        }
        let Some(child) = handle.child.as_mut() else {
            return Ok(None);
        };
        let status = child
            .wait()
            .await
            .with_context(|| format!("failed to wait for {}", path))?;
        handle.mark_exited(status.code());
        Ok(status.code())
    }

    /// Stops every live process. All of them share one `timeout` of grace, after which the
    /// stragglers are killed together.
    pub async fn shutdown_all(&mut self, timeout: Duration) -> Vec<(String, StopOutcome)> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut stopping = Vec::new();
        for (path, handle) in self.handles.iter_mut() {
            if handle.poll_exit().is_some() || !handle.is_alive() {
                continue;
            }
            if let Some(pid) = handle.pid {
                send_terminate(pid);
            }
            stopping.push(path.clone());
        }

        let mut outcomes = Vec::new();
        let mut overdue = Vec::new();
        for path in stopping {
            let Some(handle) = self.handles.get_mut(&path) else {
                continue;
            };
            let Some(child) = handle.child.as_mut() else {
                continue;
            };
            let waited = tokio::time::timeout_at(deadline, child.wait()).await;
            match waited {
                Ok(Ok(status)) => {
                    handle.mark_exited(status.code());
                    outcomes.push((path, StopOutcome::Exited(status.code())));
                }
                Ok(Err(err)) => {
                    tracing::warn!(path = %path, error = %err, "wait during shutdown failed");
                    overdue.push(path);
                }
                Err(_) => overdue.push(path),
            }
        }

        for path in &overdue {
            let Some(handle) = self.handles.get_mut(path) else {
                continue;
            };
            if let Some(pid) = handle.pid {
                kill_group(pid);
            }
            if let Some(child) = handle.child.as_mut() {
                let _ = child.start_kill();
            }
        }
        for path in overdue {
            let Some(handle) = self.handles.get_mut(&path) else {
                continue;
            };
            let Some(child) = handle.child.as_mut() else {
                continue;
            };
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "forced kill failed");
                    None
                }
            };
            handle.mark_exited(code);
            tracing::warn!(path = %path, pid = handle.pid, "script ignored terminate, killed");
            outcomes.push((path, StopOutcome::Killed(code)));
        }
        outcomes
    }

    /// Drops records of exited processes. With `keep`, records for listed paths survive.
    pub fn sweep(&mut self, keep: Option<&[String]>) -> usize {
        let before = self.handles.len();
        self.handles.retain(|path, handle| {
            handle.is_alive() || keep.map(|k| k.iter().any(|p| p == path)).unwrap_or(false)
        });
        before - self.handles.len()
    }
}

async fn wait_for_exit(
    child: &mut tokio::process::Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>> {
    if timeout.is_zero() {
        return Ok(None);
    }
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(Some(status)),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Ok(None),
    }
}

async fn force_kill(child: &mut tokio::process::Child, pid: Option<u32>) -> Result<ExitStatus> {
    if let Some(pid) = pid {
        kill_group(pid);
    }
    let _ = child.start_kill();
    Ok(child.wait().await?)
}

#[cfg(unix)]
fn send_terminate(pid: u32) {
    unsafe {
        let pid = pid as i32;
        let _ = libc::kill(-pid, libc::SIGTERM);
        let _ = libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    unsafe {
        let _ = libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(windows)]
fn send_terminate(pid: u32) {
    use windows_sys::Win32::System::Console::GenerateConsoleCtrlEvent;
    use windows_sys::Win32::System::Console::CTRL_BREAK_EVENT;
    // CTRL_BREAK is the closest console equivalent of SIGTERM.
    unsafe {
        let _ = GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
    }
}

#[cfg(not(any(unix, windows)))]
fn send_terminate(_pid: u32) {}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
