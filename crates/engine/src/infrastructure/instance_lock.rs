//! Single-instance lock file.
//!
//! Two bot processes sharing one token would answer every command twice, so
//! startup claims a PID file. A lock left behind by a dead process (or one
//! that cannot be parsed) is treated as stale and replaced.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InstanceLockError {
    #[error("Another instance is already running (PID {0})")]
    AlreadyRunning(u32),
    #[error("Lock file error: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the process; removes the lock file on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, InstanceLockError> {
        let path = path.into();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match contents.trim().parse::<u32>() {
                    Ok(pid) if pid != std::process::id() && process_alive(pid) => {
                        return Err(InstanceLockError::AlreadyRunning(pid));
                    }
                    Ok(pid) => {
                        tracing::info!(pid, path = %path.display(), "Removing stale lock file");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            path = %path.display(),
                            "Removing invalid lock file"
                        );
                    }
                }
                remove_if_present(&path)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs::write(&path, std::process::id().to_string())?;
        tracing::debug!(path = %path.display(), "Instance lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match remove_if_present(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "Lock file removed"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove lock file"),
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without procfs there is no portable liveness check; assume the holder is alive.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
