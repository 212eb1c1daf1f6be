//! Destination resolution and file materialization.
//!
//! [`SchemeDestination`] answers two questions for the installer: where
//! does a file for a given scheme go, and how is it written there. Paths
//! are derived from a [`SchemeMap`], optionally redirected to the user site
//! and re-rooted under a staging `destdir`. Writing streams the bytes
//! through a digest so every file yields its RECORD entry.
//!
//! Destinations are immutable values. Per-wheel specialisation goes
//! through [`SchemeDestination::for_source`], which derives a new value
//! rather than editing a shared one.

use crate::error::{InstallerError, Result};
use crate::hashing::{copy_with_hashing, make_executable};
use crate::record::{HashAlgorithm, RecordEntry};
use crate::scheme::{PythonVersion, Scheme, SchemeMap, USER_BASE_KEY, USER_SITE_KEY};
use crate::scripts::{FixedShebang, LauncherKind, Script, ShebangStrategy};
use crate::settings::InstallSettings;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs::{self, File};
use std::io::Read;
use std::sync::Arc;

/// Optimization level meaning "whatever the interpreter defaults to".
pub const DEFAULT_OPTIMIZATION_LEVEL: i8 = -1;

/// Where and how wheel contents are written.
#[derive(Debug, Clone)]
pub struct SchemeDestination {
    scheme_map: SchemeMap,
    interpreter: String,
    python_version: PythonVersion,
    launcher_kind: LauncherKind,
    bytecode_optimization_levels: Vec<i8>,
    destdir: Option<Utf8PathBuf>,
    hash_algorithm: HashAlgorithm,
    shebang: Arc<dyn ShebangStrategy>,
    settings: InstallSettings,
}

impl SchemeDestination {
    /// Creates a destination for the host launcher kind.
    ///
    /// Scripts get a fixed `#!/usr/bin/env python` shebang, files are hashed
    /// with SHA-256, bytecode compilation is off and no destdir is used.
    /// Settings default to all toggles off; see [`Self::with_settings`].
    #[must_use]
    pub fn new(
        scheme_map: SchemeMap,
        interpreter: impl Into<String>,
        python_version: PythonVersion,
    ) -> Self {
        Self {
            scheme_map,
            interpreter: interpreter.into(),
            python_version,
            launcher_kind: LauncherKind::host(),
            bytecode_optimization_levels: Vec::new(),
            destdir: None,
            hash_algorithm: HashAlgorithm::default(),
            shebang: Arc::new(FixedShebang::default()),
            settings: InstallSettings::default(),
        }
    }

    /// Sets the launcher kind used for entry points.
    #[must_use]
    pub fn with_launcher_kind(mut self, kind: LauncherKind) -> Self {
        self.launcher_kind = kind;
        self
    }

    /// Re-roots every resolved path under `destdir`.
    #[must_use]
    pub fn with_destdir(mut self, destdir: impl Into<Utf8PathBuf>) -> Self {
        self.destdir = Some(destdir.into());
        self
    }

    /// Sets the digest used for RECORD entries.
    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Replaces the shebang strategy for generated scripts.
    #[must_use]
    pub fn with_shebang(mut self, shebang: Arc<dyn ShebangStrategy>) -> Self {
        self.shebang = shebang;
        self
    }

    /// Applies environment-driven settings such as the user-site toggle.
    #[must_use]
    pub fn with_settings(mut self, settings: InstallSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the bytecode optimization levels; empty disables compilation.
    pub fn set_bytecode_optimization_levels(&mut self, levels: Vec<i8>) {
        self.bytecode_optimization_levels = levels;
    }

    /// Levels installed modules are compiled at.
    #[must_use]
    pub fn bytecode_optimization_levels(&self) -> &[i8] {
        &self.bytecode_optimization_levels
    }

    /// The scheme map this destination resolves against.
    #[must_use]
    pub fn scheme_map(&self) -> &SchemeMap {
        &self.scheme_map
    }

    /// Interpreter that installed scripts and bytecode target.
    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Launcher kind used for entry points.
    #[must_use]
    pub fn launcher_kind(&self) -> LauncherKind {
        self.launcher_kind
    }

    /// Staging root, if any.
    #[must_use]
    pub fn destdir(&self) -> Option<&Utf8Path> {
        self.destdir.as_deref()
    }

    /// Digest used for RECORD entries.
    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Returns the base directory for `scheme`.
    ///
    /// With the user-site toggle on, library schemes resolve to the user
    /// site and data, scripts and headers to locations under the user base,
    /// whenever the map knows those directories. Otherwise the scheme's own
    /// entry is used.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::DestinationLookup`] when no path applies.
    ///
    /// # Examples
    ///
    /// ```
    /// use wheelwright_installer::destination::SchemeDestination;
    /// use wheelwright_installer::scheme::{PythonVersion, Scheme, SchemeMap};
    ///
    /// let map = SchemeMap::from_iter([("scripts", "/opt/env/bin")]);
    /// let destination = SchemeDestination::new(map, "/opt/env/bin/python", PythonVersion::new(3, 12));
    /// assert_eq!(destination.resolve_base(Scheme::Scripts)?, "/opt/env/bin");
    /// # Ok::<(), wheelwright_installer::error::InstallerError>(())
    /// ```
    pub fn resolve_base(&self, scheme: Scheme) -> Result<Utf8PathBuf> {
        if let Some(path) = self.user_site_base(scheme) {
            return Ok(path);
        }
        self.scheme_map
            .get(scheme.as_str())
            .map(Utf8Path::to_path_buf)
            .ok_or_else(|| InstallerError::DestinationLookup {
                scheme: scheme.to_string(),
            })
    }

    fn user_site_base(&self, scheme: Scheme) -> Option<Utf8PathBuf> {
        if !self.settings.use_user_site {
            return None;
        }
        let user_base = self.scheme_map.get(USER_BASE_KEY);
        match scheme {
            Scheme::Purelib | Scheme::Platlib => {
                self.scheme_map.get(USER_SITE_KEY).map(Utf8Path::to_path_buf)
            }
            Scheme::Data => user_base.map(Utf8Path::to_path_buf),
            Scheme::Scripts => user_base.map(|base| base.join("bin")),
            Scheme::Headers => {
                let headers = self.scheme_map.get(Scheme::Headers.as_str())?;
                let distribution = headers.as_str().rsplit('/').next()?;
                user_base.map(|base| {
                    base.join("include")
                        .join(format!("python-{}", self.python_version))
                        .join(distribution)
                })
            }
        }
    }

    /// Derives the destination used for one distribution.
    ///
    /// Headers are namespaced under the distribution name; everything else
    /// is shared. The receiver is left unchanged.
    #[must_use]
    pub fn for_source(&self, distribution: &str) -> Self {
        let mut derived = self.clone();
        if let Some(headers) = self.scheme_map.get(Scheme::Headers.as_str()) {
            derived.scheme_map = self
                .scheme_map
                .with(Scheme::Headers.as_str(), headers.join(distribution));
        }
        derived
    }

    /// Returns the path a file for `scheme` at `relative` is written to.
    ///
    /// The scheme base and `relative` are joined; with a destdir the result
    /// has its root stripped and is placed under the destdir instead.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::DestinationLookup`] for unknown schemes and
    /// [`InstallerError::InvalidEntryPath`] if `relative` is absolute or
    /// climbs out of the scheme directory.
    pub fn path_with_destdir(&self, scheme: Scheme, relative: &str) -> Result<Utf8PathBuf> {
        ensure_contained(relative)?;
        let file = self.resolve_base(scheme)?.join(relative);
        let Some(destdir) = &self.destdir else {
            return Ok(file);
        };

        let mut rerooted = destdir.clone();
        for component in file.components() {
            match component {
                Utf8Component::Prefix(_) | Utf8Component::RootDir => {}
                other => rerooted.push(other.as_str()),
            }
        }
        Ok(rerooted)
    }

    /// Writes one file and returns its RECORD entry.
    ///
    /// An existing file at the target is replaced: namespace packages split
    /// across several wheels legitimately write into the same tree. Missing
    /// parent directories are created, and a directory created concurrently
    /// by another installer counts as success.
    ///
    /// # Errors
    ///
    /// Returns lookup and path errors from [`Self::path_with_destdir`] and
    /// any I/O error raised while writing.
    pub fn write_file(
        &self,
        scheme: Scheme,
        relative: &str,
        reader: &mut dyn Read,
        is_executable: bool,
    ) -> Result<RecordEntry> {
        let target = self.path_with_destdir(scheme, relative)?;
        if target.exists() {
            debug!("replacing existing file {target}");
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&target)?;
        let (hash, size) = copy_with_hashing(reader, &mut file, self.hash_algorithm)?;
        drop(file);

        if is_executable {
            make_executable(target.as_std_path())?;
        }
        Ok(RecordEntry::new(relative, hash, size))
    }

    /// Generates and writes the launcher for an entry point.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::UnsupportedLauncher`] for launcher kinds
    /// that cannot be generated, and write errors as [`Self::write_file`].
    pub fn write_script(&self, script: &Script) -> Result<RecordEntry> {
        let (name, contents) =
            script.generate(&self.interpreter, self.launcher_kind, self.shebang.as_ref())?;
        self.write_file(Scheme::Scripts, &name, &mut contents.as_slice(), true)
    }

    /// Shebang bytes for scripts shipped inside the wheel.
    #[must_use]
    pub fn script_shebang(&self) -> Vec<u8> {
        self.shebang.build(&self.interpreter, false)
    }
}

/// Rejects absolute paths and `..` components.
fn ensure_contained(relative: &str) -> Result<()> {
    let path = Utf8Path::new(relative);
    let escapes = path.is_absolute()
        || path.has_root()
        || path
            .components()
            .any(|component| matches!(component, Utf8Component::ParentDir | Utf8Component::Prefix(_)));
    if escapes || relative.is_empty() {
        return Err(InstallerError::InvalidEntryPath {
            path: relative.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;
