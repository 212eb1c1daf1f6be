//! Direct wheel installation into a Python environment.
//!
//! [`WheelInstaller`] owns the destination derived from an environment and
//! installs wheels into it one archive at a time. Wheels whose RECORD does
//! not check out are still installed; their problems are kept in a ledger
//! callers can inspect afterwards.

use crate::destination::{DEFAULT_OPTIMIZATION_LEVEL, SchemeDestination};
use crate::environment::PythonEnvironment;
use crate::error::Result;
use crate::install::{CompileAll, install};
use crate::scheme::{INCLUDE_KEY, Scheme};
use crate::settings::InstallSettings;
use crate::wheel::WheelFile;
use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use log::{info, warn};
use std::collections::BTreeMap;

/// Provenance written to `.dist-info/INSTALLER`.
fn installer_tag() -> String {
    format!("Wheelwright {}", env!("CARGO_PKG_VERSION"))
}

/// Installs wheels into one environment.
///
/// The installer can be shared between threads; each call to
/// [`Self::install`] works on its own archive and derived destination.
#[derive(Debug)]
pub struct WheelInstaller<E> {
    env: E,
    destination: SchemeDestination,
    invalid_wheels: DashMap<Utf8PathBuf, Vec<String>>,
}

impl<E: PythonEnvironment> WheelInstaller<E> {
    /// Creates an installer for `env`, reading settings from the process
    /// environment.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_settings(env, InstallSettings::from_env())
    }

    /// Creates an installer for `env` with explicit settings.
    ///
    /// Headers go to the environment's `include` directory.
    #[must_use]
    pub fn with_settings(env: E, settings: InstallSettings) -> Self {
        let mut schemes = env.scheme_paths();
        if let Some(include) = schemes.get(INCLUDE_KEY).map(Utf8Path::to_path_buf) {
            schemes.insert(Scheme::Headers.as_str(), include);
        }
        let destination =
            SchemeDestination::new(schemes, env.interpreter().as_str(), env.python_version())
                .with_settings(settings);
        Self::with_destination(env, destination)
    }

    /// Creates an installer writing through a caller-built destination.
    #[must_use]
    pub fn with_destination(env: E, destination: SchemeDestination) -> Self {
        Self {
            env,
            destination,
            invalid_wheels: DashMap::new(),
        }
    }

    /// The environment being installed into.
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.env
    }

    /// The destination every wheel is derived from.
    #[must_use]
    pub fn destination(&self) -> &SchemeDestination {
        &self.destination
    }

    /// Turns bytecode compilation of installed modules on or off.
    pub fn enable_bytecode_compilation(&mut self, enable: bool) {
        let levels = if enable {
            vec![DEFAULT_OPTIMIZATION_LEVEL]
        } else {
            Vec::new()
        };
        self.destination.set_bytecode_optimization_levels(levels);
    }

    /// Installs the wheel at `wheel_path`.
    ///
    /// RECORD problems are logged and recorded in [`Self::invalid_wheels`],
    /// replacing any issues from an earlier install of the same path;
    /// installation proceeds regardless.
    ///
    /// # Errors
    ///
    /// Returns archive, lookup and I/O errors, which abort the install.
    pub fn install(&self, wheel_path: &Utf8Path) -> Result<()> {
        let mut wheel = WheelFile::open(wheel_path)?;

        if let Err(err) = wheel.validate_record(false) {
            warn!("{err}");
            self.invalid_wheels.insert(wheel_path.to_owned(), err.issues);
        }

        let destination = self.destination.for_source(wheel.distribution());
        let tag = installer_tag();
        install(
            &mut wheel,
            &destination,
            &[("INSTALLER", tag.as_bytes())],
            &CompileAll(&self.env),
        )?;
        info!("installed {} {}", wheel.distribution(), wheel.version());
        Ok(())
    }

    /// Snapshot of the wheels that failed RECORD validation, with their
    /// issues.
    #[must_use]
    pub fn invalid_wheels(&self) -> BTreeMap<Utf8PathBuf, Vec<String>> {
        self.invalid_wheels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
