//! Process-level install settings.
//!
//! The installer honours three environment toggles. They are read once into
//! an [`InstallSettings`] value which is then passed to the destination
//! resolver and the pip argument builder, keeping both independent of the
//! process environment.

/// Redirects library, data, script and header installs to the user site.
pub const USE_USER_SITE_ENV: &str = "WHEELWRIGHT_USE_USER_SITE";

/// Stops `--isolated` being passed to pip.
pub const PIP_NO_ISOLATE_ENV: &str = "WHEELWRIGHT_PIP_NO_ISOLATE";

/// Stops `--prefix <environment>` being passed to pip.
pub const PIP_NO_PREFIX_ENV: &str = "WHEELWRIGHT_PIP_NO_PREFIX";

/// Environment-driven switches that alter install behaviour.
///
/// # Examples
///
/// ```
/// use wheelwright_installer::settings::InstallSettings;
///
/// let settings = InstallSettings::default();
/// assert!(!settings.use_user_site);
/// assert!(settings.pip_isolated());
/// assert!(settings.pip_prefix());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSettings {
    /// Resolve schemes against the user site when it is known.
    pub use_user_site: bool,
    /// Omit `--isolated` from pip invocations.
    pub pip_no_isolate: bool,
    /// Omit `--prefix` from pip invocations.
    pub pip_no_prefix: bool,
}

impl InstallSettings {
    /// Reads the settings from the current process environment.
    ///
    /// A toggle is enabled only when its variable is exactly `1`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = |name: &str| lookup(name).is_some_and(|value| value == "1");
        Self {
            use_user_site: enabled(USE_USER_SITE_ENV),
            pip_no_isolate: enabled(PIP_NO_ISOLATE_ENV),
            pip_no_prefix: enabled(PIP_NO_PREFIX_ENV),
        }
    }

    /// Whether pip should run in isolated mode.
    #[must_use]
    pub const fn pip_isolated(&self) -> bool {
        !self.pip_no_isolate
    }

    /// Whether pip should be pointed at the environment with `--prefix`.
    #[must_use]
    pub const fn pip_prefix(&self) -> bool {
        !self.pip_no_prefix
    }
}
