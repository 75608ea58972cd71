// src/forge/toolchain.rs

//! External build and check collaborators
//!
//! The pipeline delegates compilation to an external CMake toolchain and,
//! optionally, validates the finished archive with an external checker.
//! Both run as child processes with stdin closed, captured output, and a
//! wall-clock budget; a tool that exceeds its budget is killed and the run
//! aborts with a timeout error.
//!
//! The [`BuildTool`] and [`CheckTool`] traits exist so tests (and callers
//! with exotic toolchains) can substitute their own implementations.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::forge::Platform;

/// Name of the log file the check tool writes next to the archive.
pub const CHECK_LOG_NAME: &str = "checkLog.txt";

/// Compiles a generated project tree into a shared library.
pub trait BuildTool {
    /// Build the project and return the path of the produced binary.
    fn build(&self, project_dir: &Path, model_name: &str) -> Result<PathBuf>;
}

/// Validates a packaged archive.
pub trait CheckTool {
    /// Check the archive and return the produced log content.
    fn check(&self, fmu_path: &Path) -> Result<String>;
}

/// Default build collaborator: `cmake -S <project> -B <project>/new`
/// followed by `cmake --build` with the configured configuration.
#[derive(Debug, Clone)]
pub struct CmakeBuild {
    pub program: PathBuf,
    /// Passed as `-G` when set; otherwise CMake picks the host default.
    pub generator: Option<String>,
    pub build_config: String,
    pub build_dir_name: String,
    pub timeout: Duration,
    pub platform: Platform,
}

impl CmakeBuild {
    pub fn new(platform: Platform, timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("cmake"),
            generator: None,
            build_config: "Debug".to_string(),
            build_dir_name: "new".to_string(),
            timeout,
            platform,
        }
    }

    /// Find the built library below the build directory. Multi-config
    /// generators nest it under a configuration subdirectory and Unix
    /// toolchains add a `lib` prefix, so this searches rather than
    /// assuming one layout.
    fn locate_artifact(&self, build_dir: &Path, model_name: &str) -> Result<PathBuf> {
        let ext = self.platform.binary_extension();
        let candidates = [
            format!("{}.{}", model_name, ext),
            format!("lib{}.{}", model_name, ext),
        ];
        for entry in WalkDir::new(build_dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                if candidates.iter().any(|c| c == file_name) {
                    return Ok(entry.into_path());
                }
            }
        }
        Err(Error::ExternalProcess {
            tool: "cmake build".to_string(),
            reason: format!(
                "build produced no {} under {}",
                candidates[0],
                build_dir.display()
            ),
        })
    }
}

impl BuildTool for CmakeBuild {
    fn build(&self, project_dir: &Path, model_name: &str) -> Result<PathBuf> {
        let build_dir = project_dir.join(&self.build_dir_name);

        let mut configure = Command::new(&self.program);
        if let Some(generator) = &self.generator {
            configure.arg("-G").arg(generator);
        }
        configure.arg("-S").arg(project_dir).arg("-B").arg(&build_dir);
        run_tool("cmake configure", &mut configure, self.timeout)?;

        let mut build = Command::new(&self.program);
        build
            .arg("--build")
            .arg(&build_dir)
            .arg("--config")
            .arg(&self.build_config);
        run_tool("cmake build", &mut build, self.timeout)?;

        self.locate_artifact(&build_dir, model_name)
    }
}

/// Default check collaborator: runs an FMU checker binary with
/// `-e <logfile> <archive>` and reads the log back.
#[derive(Debug, Clone)]
pub struct FmuCheck {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl FmuCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("fmuCheck"),
            timeout,
        }
    }
}

impl CheckTool for FmuCheck {
    fn check(&self, fmu_path: &Path) -> Result<String> {
        let log_path = fmu_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CHECK_LOG_NAME);

        let mut command = Command::new(&self.program);
        command.arg("-e").arg(&log_path).arg(fmu_path);

        match run_tool("fmuCheck", &mut command, self.timeout) {
            Ok(()) => Ok(std::fs::read_to_string(&log_path).unwrap_or_default()),
            Err(Error::ExternalProcess { tool, reason }) => {
                // checkers put their verdict on the first log line
                let first_line = std::fs::read_to_string(&log_path)
                    .ok()
                    .and_then(|log| log.lines().next().map(str::to_string));
                let reason = match first_line {
                    Some(line) if !line.is_empty() => format!("{} ({})", reason, line),
                    _ => reason,
                };
                Err(Error::ExternalProcess { tool, reason })
            }
            Err(e) => Err(e),
        }
    }
}

/// Run one external tool to completion with stdin closed and a wall-clock
/// budget. Output is captured and logged line by line; a nonzero exit
/// becomes an error carrying the exit code and the last stderr line.
fn run_tool(tool: &str, command: &mut Command, timeout: Duration) -> Result<()> {
    debug!("running {}: {:?}", tool, command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::ExternalProcess {
            tool: tool.to_string(),
            reason: format!("failed to launch: {}", e),
        })?;

    match child.wait_timeout(timeout)? {
        Some(status) => {
            let output = child.wait_with_output()?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            for line in stdout.lines() {
                debug!("[{}] {}", tool, line);
            }
            for line in stderr.lines() {
                warn!("[{}] {}", tool, line);
            }

            if status.success() {
                Ok(())
            } else {
                let code = status.code().unwrap_or(-1);
                let trail = stderr.lines().last().unwrap_or("");
                let reason = if trail.is_empty() {
                    format!("exit code {}", code)
                } else {
                    format!("exit code {}: {}", code, trail)
                };
                Err(Error::ExternalProcess {
                    tool: tool.to_string(),
                    reason,
                })
            }
        }
        None => {
            let _ = child.kill();
            Err(Error::ProcessTimeout {
                tool: tool.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_tool_success() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello");
        run_tool("test", &mut cmd, Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_run_tool_failure_carries_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        let err = run_tool("test", &mut cmd, Duration::from_secs(5)).unwrap_err();
        match err {
            Error::ExternalProcess { tool, reason } => {
                assert_eq!(tool, "test");
                assert!(reason.contains("3"));
                assert!(reason.contains("oops"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_run_tool_timeout_kills_process() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30");
        let err = run_tool("slow", &mut cmd, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, Error::ProcessTimeout { .. }));
    }

    #[test]
    fn test_run_tool_missing_program() {
        let mut cmd = Command::new("definitely-not-a-real-tool-2024");
        let err = run_tool("ghost", &mut cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::ExternalProcess { .. }));
    }

    #[test]
    fn test_locate_artifact_in_config_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("new");
        std::fs::create_dir_all(build_dir.join("Debug")).unwrap();
        std::fs::write(build_dir.join("Debug/tank.dll"), b"bin").unwrap();

        let tool = CmakeBuild::new(Platform::Win64, Duration::from_secs(1));
        let found = tool.locate_artifact(&build_dir, "tank").unwrap();
        assert!(found.ends_with("Debug/tank.dll"));
    }

    #[test]
    fn test_locate_artifact_accepts_lib_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("new");
        std::fs::create_dir_all(&build_dir).unwrap();
        std::fs::write(build_dir.join("libtank.so"), b"bin").unwrap();

        let tool = CmakeBuild::new(Platform::Linux64, Duration::from_secs(1));
        let found = tool.locate_artifact(&build_dir, "tank").unwrap();
        assert!(found.ends_with("libtank.so"));
    }

    #[test]
    fn test_locate_artifact_missing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CmakeBuild::new(Platform::Win64, Duration::from_secs(1));
        let err = tool.locate_artifact(dir.path(), "tank").unwrap_err();
        assert!(matches!(err, Error::ExternalProcess { .. }));
    }
}
