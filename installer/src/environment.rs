//! The Python environment being installed into.
//!
//! Installation needs four things from an environment: its root, its
//! interpreter, the scheme directories that interpreter reports, and a way
//! to run the interpreter (for pip and bytecode compilation).
//! [`PythonEnvironment`] captures exactly that; [`VirtualEnv`] implements
//! it on top of a [`CommandExecutor`].

use crate::command::{CommandExecutor, SystemCommandExecutor, run_checked};
use crate::error::{InstallerError, Result};
use crate::scheme::{PythonVersion, SchemeMap};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Prints the interpreter version and install paths as JSON.
const SYSCONFIG_QUERY: &str = "\
import json, site, sys, sysconfig
paths = dict(sysconfig.get_paths())
if site.ENABLE_USER_SITE:
    paths['usersite'] = site.getusersitepackages()
    paths['userbase'] = site.getuserbase()
print(json.dumps({'major': sys.version_info[0], 'minor': sys.version_info[1], 'paths': paths}))
";

/// An environment packages can be installed into.
pub trait PythonEnvironment {
    /// Root directory of the environment, used as pip's `--prefix`.
    fn root(&self) -> &Utf8Path;

    /// Path to the environment's interpreter.
    fn interpreter(&self) -> &Utf8Path;

    /// Interpreter `major.minor` version.
    fn python_version(&self) -> PythonVersion;

    /// Scheme directories, including `include` and any user-site entries.
    fn scheme_paths(&self) -> SchemeMap;

    /// Runs the interpreter with `args`, returning standard output.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::CommandFailed`] on a non-zero exit.
    fn run_python(&self, args: &[String]) -> Result<String>;

    /// Runs `python -m pip` with `args`, returning standard output.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::CommandFailed`] on a non-zero exit.
    fn run_pip(&self, args: &[String]) -> Result<String> {
        let mut full = vec!["-m".to_owned(), "pip".to_owned()];
        full.extend_from_slice(args);
        self.run_python(&full)
    }
}

#[derive(Debug, Deserialize)]
struct SysconfigReport {
    major: u32,
    minor: u32,
    paths: BTreeMap<String, String>,
}

/// A virtual environment (or any prefix with its own interpreter).
#[derive(Debug, Clone)]
pub struct VirtualEnv<X = SystemCommandExecutor> {
    root: Utf8PathBuf,
    interpreter: Utf8PathBuf,
    python_version: PythonVersion,
    scheme_paths: SchemeMap,
    executor: X,
}

impl<X: CommandExecutor> VirtualEnv<X> {
    /// Creates an environment from already known facts.
    #[must_use]
    pub fn new(
        root: Utf8PathBuf,
        interpreter: Utf8PathBuf,
        python_version: PythonVersion,
        scheme_paths: SchemeMap,
        executor: X,
    ) -> Self {
        Self {
            root,
            interpreter,
            python_version,
            scheme_paths,
            executor,
        }
    }

    /// Describes the environment at `root` by querying its interpreter.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::EnvironmentDiscovery`] if the interpreter
    /// cannot be run or its report cannot be parsed.
    pub fn discover(root: &Utf8Path, executor: X) -> Result<Self> {
        let interpreter = default_interpreter(root);
        let report = run_checked(&executor, interpreter.as_str(), &["-c", SYSCONFIG_QUERY])
            .map_err(|err| InstallerError::EnvironmentDiscovery {
                reason: format!("cannot query {interpreter}: {err}"),
            })?;
        let report: SysconfigReport =
            serde_json::from_str(report.trim()).map_err(|err| {
                InstallerError::EnvironmentDiscovery {
                    reason: format!("unexpected sysconfig report: {err}"),
                }
            })?;
        debug!(
            "discovered Python {}.{} at {interpreter}",
            report.major, report.minor
        );

        Ok(Self::new(
            root.to_owned(),
            interpreter,
            PythonVersion::new(report.major, report.minor),
            report.paths.into_iter().collect(),
            executor,
        ))
    }
}

impl<X: CommandExecutor> PythonEnvironment for VirtualEnv<X> {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn interpreter(&self) -> &Utf8Path {
        &self.interpreter
    }

    fn python_version(&self) -> PythonVersion {
        self.python_version
    }

    fn scheme_paths(&self) -> SchemeMap {
        self.scheme_paths.clone()
    }

    fn run_python(&self, args: &[String]) -> Result<String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_checked(&self.executor, self.interpreter.as_str(), &args)
    }
}

/// Interpreter location inside an environment root.
fn default_interpreter(root: &Utf8Path) -> Utf8PathBuf {
    if cfg!(windows) {
        root.join("Scripts").join("python.exe")
    } else {
        root.join("bin").join("python")
    }
}
