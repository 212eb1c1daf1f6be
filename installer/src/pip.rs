//! Installation through a `pip` subprocess.
//!
//! Source distributions, local project directories (including editable
//! installs) and URLs cannot be extracted directly; they are handed to the
//! environment's own pip instead. The builders here only assemble the
//! arguments of pip's `install` subcommand, so they can be checked without
//! running anything.

use crate::environment::PythonEnvironment;
use crate::error::{InstallerError, Result};
use crate::settings::InstallSettings;
use camino::Utf8Path;
use log::info;

/// Builds the `pip install` options for a local target.
///
/// The returned vector excludes the `install` subcommand itself.
///
/// # Errors
///
/// Returns [`InstallerError::EditableTargetNotDirectory`] when `editable`
/// is set and `target` is not a directory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use wheelwright_installer::pip::build_install_args;
/// use wheelwright_installer::settings::InstallSettings;
///
/// let args = build_install_args(
///     Utf8Path::new("/pkg"),
///     Utf8Path::new("/env"),
///     false,
///     false,
///     true,
///     &InstallSettings::default(),
/// )?;
/// assert_eq!(
///     args,
///     [
///         "--disable-pip-version-check",
///         "--use-pep517",
///         "--isolated",
///         "--no-input",
///         "--prefix",
///         "/env",
///         "--upgrade",
///         "--no-deps",
///         "/pkg",
///     ]
/// );
/// # Ok::<(), wheelwright_installer::error::InstallerError>(())
/// ```
pub fn build_install_args(
    target: &Utf8Path,
    environment_path: &Utf8Path,
    editable: bool,
    include_deps: bool,
    upgrade: bool,
    settings: &InstallSettings,
) -> Result<Vec<String>> {
    let mut args = vec!["--disable-pip-version-check".to_owned()];
    if settings.pip_isolated() {
        args.push("--isolated".to_owned());
    }
    args.push("--no-input".to_owned());
    if settings.pip_prefix() {
        args.push("--prefix".to_owned());
        args.push(environment_path.to_string());
    }

    let is_wheel = target.extension() == Some("whl");
    if !is_wheel && !editable {
        args.insert(1, "--use-pep517".to_owned());
    }

    if upgrade {
        args.push("--upgrade".to_owned());
    }
    if !include_deps {
        args.push("--no-deps".to_owned());
    }

    if editable {
        if !target.is_dir() {
            return Err(InstallerError::EditableTargetNotDirectory {
                path: target.to_owned(),
            });
        }
        args.push("-e".to_owned());
    }

    args.push(target.to_string());
    Ok(args)
}

/// Builds the `pip install` options for a remote URL.
///
/// Dependencies are never pulled in for URL installs.
#[must_use]
pub fn build_url_install_args(url: &str, upgrade: bool) -> Vec<String> {
    let mut args = vec!["--no-deps".to_owned()];
    if upgrade {
        args.push("--upgrade".to_owned());
    }
    args.push(url.to_owned());
    args
}

/// Installs `target` into `env` with pip, using settings from the process
/// environment. Returns pip's standard output.
///
/// # Errors
///
/// Returns [`InstallerError::EditableTargetNotDirectory`] for bad editable
/// targets and [`InstallerError::PipInstallFailed`] when pip fails.
pub fn pip_install<E: PythonEnvironment + ?Sized>(
    target: &Utf8Path,
    env: &E,
    editable: bool,
    include_deps: bool,
    upgrade: bool,
) -> Result<String> {
    pip_install_with_settings(
        target,
        env,
        editable,
        include_deps,
        upgrade,
        &InstallSettings::from_env(),
    )
}

/// Installs `target` into `env` with pip under explicit settings.
///
/// # Errors
///
/// See [`pip_install`].
pub fn pip_install_with_settings<E: PythonEnvironment + ?Sized>(
    target: &Utf8Path,
    env: &E,
    editable: bool,
    include_deps: bool,
    upgrade: bool,
    settings: &InstallSettings,
) -> Result<String> {
    let args = build_install_args(target, env.root(), editable, include_deps, upgrade, settings)?;
    info!("installing {target} with pip");
    run_install(env, args)
        .map_err(|err| InstallerError::pip_install_failed(target.as_str(), err))
}

/// Installs the package at `url` into `env` with pip.
///
/// # Errors
///
/// Returns [`InstallerError::PipInstallFailed`] when pip fails.
pub fn pip_install_from_url<E: PythonEnvironment + ?Sized>(
    url: &str,
    env: &E,
    upgrade: bool,
) -> Result<String> {
    info!("installing {url} with pip");
    run_install(env, build_url_install_args(url, upgrade))
        .map_err(|err| InstallerError::pip_install_failed(url, err))
}

fn run_install<E: PythonEnvironment + ?Sized>(env: &E, options: Vec<String>) -> Result<String> {
    let mut args = Vec::with_capacity(options.len() + 1);
    args.push("install".to_owned());
    args.extend(options);
    env.run_pip(&args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::VirtualEnv;
    use crate::scheme::{PythonVersion, SchemeMap};
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, output_with_stdout};
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::error::Error as _;

    fn env_with(calls: Vec<ExpectedCall>) -> VirtualEnv<StubExecutor> {
        VirtualEnv::new(
            Utf8PathBuf::from("/opt/env"),
            Utf8PathBuf::from("/opt/env/bin/python"),
            PythonVersion::new(3, 12),
            SchemeMap::new(),
            StubExecutor::new(calls),
        )
    }

    fn build(target: &str, editable: bool, settings: &InstallSettings) -> Result<Vec<String>> {
        build_install_args(
            Utf8Path::new(target),
            Utf8Path::new("/opt/env"),
            editable,
            false,
            false,
            settings,
        )
    }

    #[test]
    fn source_target_gets_full_argument_order() {
        let args = build_install_args(
            Utf8Path::new("/pkg"),
            Utf8Path::new("/env"),
            false,
            false,
            true,
            &InstallSettings::default(),
        )
        .expect("args");

        assert_eq!(
            args,
            [
                "--disable-pip-version-check",
                "--use-pep517",
                "--isolated",
                "--no-input",
                "--prefix",
                "/env",
                "--upgrade",
                "--no-deps",
                "/pkg",
            ]
        );
    }

    #[rstest]
    #[case::sdist("/dl/demo-1.0.tar.gz", true)]
    #[case::project_dir("/src/demo", true)]
    #[case::wheel("/dl/demo-1.0-py3-none-any.whl", false)]
    fn pep517_flag_only_for_non_wheels(#[case] target: &str, #[case] expected: bool) {
        let args = build(target, false, &InstallSettings::default()).expect("args");
        assert_eq!(args.iter().any(|arg| arg == "--use-pep517"), expected);
    }

    #[test]
    fn editable_directory_skips_pep517_and_precedes_target() {
        let temp = tempfile::tempdir().expect("temp dir");
        let project = temp.path().to_str().expect("UTF-8 temp dir");

        let args = build(project, true, &InstallSettings::default()).expect("args");

        assert!(!args.iter().any(|arg| arg == "--use-pep517"));
        let tail: Vec<&str> = args.iter().rev().take(2).rev().map(String::as_str).collect();
        assert_eq!(tail, ["-e", project]);
    }

    #[test]
    fn editable_file_target_is_rejected() {
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        let target = temp.path().to_str().expect("UTF-8 temp file");

        let err = build(target, true, &InstallSettings::default()).expect_err("not a directory");
        assert!(matches!(
            err,
            InstallerError::EditableTargetNotDirectory { ref path } if path == target
        ));
    }

    #[test]
    fn settings_drop_isolation_and_prefix() {
        let settings = InstallSettings {
            pip_no_isolate: true,
            pip_no_prefix: true,
            ..InstallSettings::default()
        };

        let args = build("/dl/demo-1.0-py3-none-any.whl", false, &settings).expect("args");

        assert_eq!(
            args,
            [
                "--disable-pip-version-check",
                "--no-input",
                "--no-deps",
                "/dl/demo-1.0-py3-none-any.whl",
            ]
        );
    }

    #[test]
    fn include_deps_omits_no_deps() {
        let args = build_install_args(
            Utf8Path::new("/dl/demo-1.0-py3-none-any.whl"),
            Utf8Path::new("/opt/env"),
            false,
            true,
            false,
            &InstallSettings::default(),
        )
        .expect("args");
        assert!(!args.iter().any(|arg| arg == "--no-deps"));
    }

    #[rstest]
    #[case::plain(false, vec!["--no-deps", "https://example.com/demo.whl"])]
    #[case::upgrade(true, vec!["--no-deps", "--upgrade", "https://example.com/demo.whl"])]
    fn url_arguments(#[case] upgrade: bool, #[case] expected: Vec<&str>) {
        assert_eq!(
            build_url_install_args("https://example.com/demo.whl", upgrade),
            expected
        );
    }

    #[test]
    fn pip_install_runs_install_subcommand() {
        let env = env_with(vec![ExpectedCall {
            cmd: "/opt/env/bin/python",
            args: vec![
                "-m",
                "pip",
                "install",
                "--disable-pip-version-check",
                "--use-pep517",
                "--isolated",
                "--no-input",
                "--prefix",
                "/opt/env",
                "--no-deps",
                "/src/demo-1.0.tar.gz",
            ],
            result: Ok(output_with_stdout("Successfully installed demo-1.0\n")),
        }]);

        let stdout = pip_install_with_settings(
            Utf8Path::new("/src/demo-1.0.tar.gz"),
            &env,
            false,
            false,
            false,
            &InstallSettings::default(),
        )
        .expect("pip install");

        assert_eq!(stdout, "Successfully installed demo-1.0\n");
    }

    #[test]
    fn pip_failure_is_wrapped_with_target() {
        let env = env_with(vec![ExpectedCall {
            cmd: "/opt/env/bin/python",
            args: vec!["-m", "pip", "install", "--no-deps", "https://example.com/demo.whl"],
            result: Ok(failure_output("ERROR: 404 Not Found")),
        }]);

        let err = pip_install_from_url("https://example.com/demo.whl", &env, false)
            .expect_err("pip failure");

        assert!(matches!(
            err,
            InstallerError::PipInstallFailed { ref target, .. } if target == "https://example.com/demo.whl"
        ));
        let source = err.source().expect("source error");
        assert!(source.to_string().contains("404 Not Found"));
    }
}
