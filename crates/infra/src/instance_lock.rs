//! Single-instance lock using PID files
//!
//! Prevents two agents from sharing one root, which would let their jobs
//! purge each other's uploads directory.

use std::fs;
use std::path::{Path, PathBuf};

use tidewater_domain::{AgentError, Result};

use crate::errors::infra_err;

/// Single-instance lock manager
#[derive(Debug)]
pub struct InstanceLock {
    pid_file: PathBuf,
}

impl InstanceLock {
    /// Take the lock at `pid_file`.
    ///
    /// Returns an error if another live process holds it. A PID file left by
    /// a dead process is replaced.
    pub fn acquire(pid_file: impl AsRef<Path>) -> Result<Self> {
        let pid_file = pid_file.as_ref().to_path_buf();

        if pid_file.exists() {
            if let Ok(content) = fs::read_to_string(&pid_file) {
                if let Ok(pid) = content.trim().parse::<u32>() {
                    if Self::is_process_running(pid) {
                        tracing::warn!(existing_pid = pid, "instance_lock.process_active");
                        return Err(AgentError::Config(format!(
                            "another agent is already running on this root (PID {pid})"
                        )));
                    }
                    tracing::warn!(stale_pid = pid, "instance_lock.stale_pid_file_detected");
                }
            }
            if let Err(err) = fs::remove_file(&pid_file) {
                tracing::warn!(
                    error = %err,
                    path = %pid_file.display(),
                    "instance_lock.remove_stale_pid_failed"
                );
            }
        }

        if let Some(parent) = pid_file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| infra_err(e, format!("create {}", parent.display())))?;
        }
        let current_pid = std::process::id();
        fs::write(&pid_file, current_pid.to_string())
            .map_err(|e| infra_err(e, format!("write PID file {}", pid_file.display())))?;

        tracing::info!(pid = current_pid, path = %pid_file.display(), "instance_lock.acquired");

        Ok(Self { pid_file })
    }

    #[cfg(target_os = "macos")]
    fn is_process_running(pid: u32) -> bool {
        use std::process::Command;

        // `kill -0` checks for the process without signalling it
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    fn is_process_running(pid: u32) -> bool {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn is_process_running(pid: u32) -> bool {
        tracing::warn!(pid, "instance_lock.process_check_unsupported");
        false
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.pid_file) {
            tracing::warn!(
                error = %e,
                path = %self.pid_file.display(),
                "instance_lock.remove_pid_failed"
            );
        } else {
            tracing::info!(path = %self.pid_file.display(), "instance_lock.released");
        }
    }
}
