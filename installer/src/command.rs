//! External command execution.
//!
//! Every subprocess the installer starts (pip, bytecode compilation,
//! interpreter queries) goes through [`CommandExecutor`] so tests can stub
//! the process boundary.

use crate::error::{InstallerError, Result};
use log::debug;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wheelwright_installer::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("python3", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), wheelwright_installer::error::InstallerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(InstallerError::from)
    }
}

/// Runs a command and returns its standard output, failing on a non-zero
/// exit.
///
/// # Errors
///
/// Returns spawn errors from the executor, or
/// [`InstallerError::CommandFailed`] carrying the trimmed standard error
/// when the command exits unsuccessfully.
pub fn run_checked(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> Result<String> {
    let output = executor.run(cmd, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InstallerError::CommandFailed {
            program: cmd.to_owned(),
            status: output.status,
            stderr: stderr.trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
