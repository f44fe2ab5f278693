/*!
 * Process Boundary
 * Runs a module package as a child OS process talking over stdin/stdout
 */

use super::connection::Connection;
use super::framing::{StreamReader, StreamWriter};
use super::package::ModulePackage;
use super::protocol::Request;
use super::{Boundary, BoundaryLauncher};
use crate::config::ModuleConfig;
use crate::core::errors::BoundaryError;
use crate::core::limits::MODULE_CONFIG_ENV;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Environment passed through to module processes; everything else is cleared
const INHERITED_ENV: &[&str] = &["RUST_LOG", "RUST_BACKTRACE", "SNIP_TRACE_JSON"];

/// Launches every package as its own process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl BoundaryLauncher for ProcessLauncher {
    fn launch(
        &self,
        name: &str,
        package: &ModulePackage,
        config: &ModuleConfig,
    ) -> Result<Box<dyn Boundary>, BoundaryError> {
        Ok(Box::new(ProcessBoundary::spawn(name, package, config)?))
    }
}

pub struct ProcessBoundary {
    name: String,
    os_pid: u32,
    connection: Arc<Connection>,
    child: Mutex<Option<Child>>,
    shadow_dir: Option<PathBuf>,
}

impl ProcessBoundary {
    pub fn spawn(
        name: &str,
        package: &ModulePackage,
        config: &ModuleConfig,
    ) -> Result<Self, BoundaryError> {
        validate_package_path(package.path())?;

        let (program, shadow_dir) = if config.shadow_copy {
            let (program, dir) = shadow_copy(name, package.path())?;
            (program, Some(dir))
        } else {
            (package.path().to_path_buf(), None)
        };

        let mut cmd = Command::new(&program);

        // Start from a clean environment
        cmd.env_clear();
        for key in INHERITED_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        if let Some(config_path) = package.config_path() {
            cmd.env(MODULE_CONFIG_ENV, config_path);
        }

        // Co-located native resources resolve relative to the package
        cmd.current_dir(package.directory());

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| BoundaryError::SpawnFailed(format!("{}: {}", program.display(), e)))?;

        let os_pid = child.id();
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BoundaryError::SpawnFailed(format!(
                    "{}: stdio not captured",
                    program.display()
                )));
            }
        };

        let connection = Connection::open(
            name,
            Box::new(StreamReader::new(stdout)),
            Box::new(StreamWriter::new(stdin)),
        )?;

        info!(
            boundary = %name,
            os_pid,
            package = %package.path().display(),
            shadow = shadow_dir.is_some(),
            "Spawned module boundary process"
        );

        Ok(Self {
            name: name.to_string(),
            os_pid,
            connection,
            child: Mutex::new(Some(child)),
            shadow_dir,
        })
    }

    pub fn os_pid(&self) -> u32 {
        self.os_pid
    }

    fn remove_shadow(&self) -> Result<(), BoundaryError> {
        match &self.shadow_dir {
            Some(dir) if dir.exists() => std::fs::remove_dir_all(dir).map_err(|e| {
                BoundaryError::Teardown(format!("shadow directory {}: {}", dir.display(), e))
            }),
            _ => Ok(()),
        }
    }
}

impl Boundary for ProcessBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn is_alive(&self) -> bool {
        if self.connection.is_closed() {
            return false;
        }
        match self.child.lock().as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn teardown(&self, grace: Duration) -> Result<(), BoundaryError> {
        let Some(mut child) = self.child.lock().take() else {
            return Ok(());
        };

        // Ask nicely, then close stdin; a well-behaved module exits on either
        let _ = self.connection.notify(Request::Shutdown);
        self.connection.close();

        let deadline = Instant::now() + grace;
        let exited = loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(boundary = %self.name, code = ?status.code(), "Module process exited");
                    break true;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                Ok(None) => break false,
                Err(e) => {
                    warn!(boundary = %self.name, error = %e, "Error checking module process");
                    break false;
                }
            }
        };

        let killed = if exited {
            Ok(())
        } else {
            // Hard stop: in-flight calls are not waited for
            match child.kill() {
                Ok(()) => {
                    info!(boundary = %self.name, os_pid = self.os_pid, "Killed module process");
                    let _ = child.wait();
                    Ok(())
                }
                Err(e) => Err(BoundaryError::Teardown(format!(
                    "failed to kill {} (os pid {}): {}",
                    self.name, self.os_pid, e
                ))),
            }
        };

        let shadow = self.remove_shadow();
        killed.and(shadow)
    }
}

impl Drop for ProcessBoundary {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.lock().take() {
            self.connection.close();
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Reject paths that cannot be a package before anything is spawned
fn validate_package_path(path: &Path) -> Result<(), BoundaryError> {
    if !path.is_absolute() {
        return Err(BoundaryError::SpawnFailed(format!(
            "package path must be absolute: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(BoundaryError::SpawnFailed(format!(
            "package is not a file: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Copy the package into its own directory so the original is never locked
fn shadow_copy(name: &str, package: &Path) -> Result<(PathBuf, PathBuf), BoundaryError> {
    let dir = std::env::temp_dir()
        .join("snip-modules-shadow")
        .join(format!("{}-{}", name, Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir)?;

    let file_name = package
        .file_name()
        .ok_or_else(|| BoundaryError::SpawnFailed(format!("no file name: {}", package.display())))?;
    let target = dir.join(file_name);
    std::fs::copy(package, &target)?;

    debug!(boundary = %name, shadow = %target.display(), "Shadow-copied package");
    Ok((target, dir))
}
