//! Behaviour-driven tests for the pip fallback.
//!
//! These scenarios exercise argument construction only; no pip process is
//! started.

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::{Cell, RefCell};
use wheelwright_installer::error::InstallerError;
use wheelwright_installer::pip::build_install_args;
use wheelwright_installer::settings::InstallSettings;

#[derive(Default)]
struct PipWorld {
    target: RefCell<Utf8PathBuf>,
    editable: Cell<bool>,
    settings: Cell<InstallSettings>,
    scratch: RefCell<Option<tempfile::NamedTempFile>>,
    result: RefCell<Option<Result<Vec<String>, InstallerError>>>,
}

impl PipWorld {
    fn args(&self) -> Vec<String> {
        match self.result.borrow().as_ref() {
            Some(Ok(args)) => args.clone(),
            other => panic!("expected arguments, got {other:?}"),
        }
    }
}

#[fixture]
fn pip_world() -> PipWorld {
    PipWorld::default()
}

#[given("a source distribution target")]
fn given_sdist_target(pip_world: &PipWorld) {
    pip_world
        .target
        .replace(Utf8PathBuf::from("/downloads/demo-1.0.tar.gz"));
}

#[given("a wheel target")]
fn given_wheel_target(pip_world: &PipWorld) {
    pip_world
        .target
        .replace(Utf8PathBuf::from("/downloads/demo-1.0-py3-none-any.whl"));
}

#[given("an editable target that is a file")]
fn given_editable_file(pip_world: &PipWorld) {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let path = Utf8PathBuf::try_from(file.path().to_path_buf()).expect("temp file not UTF-8");
    pip_world.target.replace(path);
    pip_world.scratch.replace(Some(file));
    pip_world.editable.set(true);
}

#[given("pip isolation and prefix are disabled")]
fn given_isolation_and_prefix_disabled(pip_world: &PipWorld) {
    pip_world.settings.set(InstallSettings {
        pip_no_isolate: true,
        pip_no_prefix: true,
        ..InstallSettings::default()
    });
}

#[when("the pip install arguments are built")]
fn when_arguments_built(pip_world: &PipWorld) {
    let target = pip_world.target.borrow().clone();
    let result = build_install_args(
        &target,
        Utf8Path::new("/opt/env"),
        pip_world.editable.get(),
        false,
        false,
        &pip_world.settings.get(),
    );
    pip_world.result.replace(Some(result));
}

#[then("the PEP 517 flag follows the version check flag")]
fn then_pep517_second(pip_world: &PipWorld) {
    let args = pip_world.args();
    assert_eq!(args.first().map(String::as_str), Some("--disable-pip-version-check"));
    assert_eq!(args.get(1).map(String::as_str), Some("--use-pep517"));
}

#[then("the environment prefix is passed")]
fn then_prefix_passed(pip_world: &PipWorld) {
    let args = pip_world.args();
    let position = args
        .iter()
        .position(|arg| arg == "--prefix")
        .expect("--prefix should be present");
    assert_eq!(args.get(position + 1).map(String::as_str), Some("/opt/env"));
}

#[then("the target is the last argument")]
fn then_target_last(pip_world: &PipWorld) {
    let args = pip_world.args();
    let target = pip_world.target.borrow();
    assert_eq!(args.last().map(String::as_str), Some(target.as_str()));
}

#[then("no PEP 517 flag is passed")]
fn then_no_pep517(pip_world: &PipWorld) {
    assert!(!pip_world.args().iter().any(|arg| arg == "--use-pep517"));
}

#[then("the editable target is rejected")]
fn then_editable_rejected(pip_world: &PipWorld) {
    let result = pip_world.result.borrow();
    assert!(
        matches!(
            result.as_ref(),
            Some(Err(InstallerError::EditableTargetNotDirectory { .. }))
        ),
        "expected an editable target error, got {result:?}"
    );
}

#[then("neither isolation nor prefix is passed")]
fn then_no_isolation_or_prefix(pip_world: &PipWorld) {
    let args = pip_world.args();
    assert!(!args.iter().any(|arg| arg == "--isolated"));
    assert!(!args.iter().any(|arg| arg == "--prefix"));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/pip_install.feature", index = 0)]
fn scenario_build_sdist_arguments(pip_world: PipWorld) {
    let _ = pip_world;
}

#[scenario(path = "tests/features/pip_install.feature", index = 1)]
fn scenario_build_wheel_arguments(pip_world: PipWorld) {
    let _ = pip_world;
}

#[scenario(path = "tests/features/pip_install.feature", index = 2)]
fn scenario_reject_editable_file(pip_world: PipWorld) {
    let _ = pip_world;
}

#[scenario(path = "tests/features/pip_install.feature", index = 3)]
fn scenario_honour_disabled_isolation(pip_world: PipWorld) {
    let _ = pip_world;
}
