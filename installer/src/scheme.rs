//! Install schemes and the scheme map.
//!
//! A scheme is a named category of install location. Wheels address five of
//! them directly; the map may additionally carry the user-site keys
//! [`USER_SITE_KEY`] and [`USER_BASE_KEY`] and the interpreter's
//! [`INCLUDE_KEY`], which the destination resolver consults.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Map key holding the user site-packages directory.
pub const USER_SITE_KEY: &str = "usersite";

/// Map key holding the user base directory.
pub const USER_BASE_KEY: &str = "userbase";

/// Map key holding the interpreter's include directory.
pub const INCLUDE_KEY: &str = "include";

/// A scheme a wheel can install files into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    /// Pure Python library code.
    Purelib,
    /// Platform-specific library code.
    Platlib,
    /// Console and GUI executables.
    Scripts,
    /// Arbitrary data files installed relative to the environment root.
    Data,
    /// C header files.
    Headers,
}

impl Scheme {
    /// All schemes, in the order wheels conventionally list them.
    pub const ALL: [Self; 5] = [
        Self::Purelib,
        Self::Platlib,
        Self::Scripts,
        Self::Data,
        Self::Headers,
    ];

    /// The scheme's key as used in `sysconfig` and wheel `.data` directories.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purelib => "purelib",
            Self::Platlib => "platlib",
            Self::Scripts => "scripts",
            Self::Data => "data",
            Self::Headers => "headers",
        }
    }

    /// Returns `true` for the two library schemes.
    #[must_use]
    pub const fn is_library(self) -> bool {
        matches!(self, Self::Purelib | Self::Platlib)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == value)
            .ok_or_else(|| format!("unknown scheme {value}"))
    }
}

/// Mapping from scheme key to absolute base directory.
///
/// # Examples
///
/// ```
/// use wheelwright_installer::scheme::{Scheme, SchemeMap};
///
/// let map = SchemeMap::from_iter([("scripts", "/opt/env/bin")]);
/// assert_eq!(map.get(Scheme::Scripts.as_str()).map(|p| p.as_str()), Some("/opt/env/bin"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeMap(BTreeMap<String, Utf8PathBuf>);

impl SchemeMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the base directory for `key`, ignoring blank entries.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Utf8Path> {
        self.0
            .get(key)
            .map(Utf8PathBuf::as_path)
            .filter(|path| !path.as_str().is_empty())
    }

    /// Returns `true` when `key` maps to a non-blank path.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets the base directory for `key`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
    ) -> Option<Utf8PathBuf> {
        self.0.insert(key.into(), path.into())
    }

    /// Returns a copy of the map with `key` set to `path`.
    #[must_use]
    pub fn with(&self, key: &str, path: impl Into<Utf8PathBuf>) -> Self {
        let mut copy = self.clone();
        copy.insert(key, path);
        copy
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Utf8Path)> {
        self.0.iter().map(|(key, path)| (key.as_str(), path.as_path()))
    }
}

impl<K, P> FromIterator<(K, P)> for SchemeMap
where
    K: Into<String>,
    P: Into<Utf8PathBuf>,
{
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, path)| (key.into(), path.into()))
                .collect(),
        )
    }
}

/// A Python `major.minor` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub struct PythonVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl PythonVersion {
    /// Creates a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
