//! Entry-point launcher scripts.
//!
//! Wheels declare console and GUI commands in `entry_points.txt`; the
//! installer turns each into a small Python script in the `scripts` scheme.
//! How the first line of those scripts is formed is pluggable through
//! [`ShebangStrategy`], so callers can pin a portable interpreter lookup
//! instead of the environment's absolute interpreter path.

use crate::error::{InstallerError, Result};
use std::fmt;

/// Longest shebang line most kernels accept.
const MAX_SHEBANG_LENGTH: usize = 127;

/// Flavour of launcher to generate for entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LauncherKind {
    /// Plain script with a shebang line.
    Posix,
    /// 32-bit x86 Windows launcher executable.
    WinIa32,
    /// 64-bit x86 Windows launcher executable.
    WinAmd64,
    /// 32-bit ARM Windows launcher executable.
    WinArm,
    /// 64-bit ARM Windows launcher executable.
    WinArm64,
}

impl LauncherKind {
    /// The launcher kind matching the platform this crate was built for.
    #[must_use]
    pub const fn host() -> Self {
        if !cfg!(windows) {
            Self::Posix
        } else if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            if cfg!(target_pointer_width = "64") {
                Self::WinArm64
            } else {
                Self::WinArm
            }
        } else if cfg!(target_pointer_width = "64") {
            Self::WinAmd64
        } else {
            Self::WinIa32
        }
    }

    /// Name of the kind, as used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posix => "posix",
            Self::WinIa32 => "win-ia32",
            Self::WinAmd64 => "win-amd64",
            Self::WinArm => "win-arm",
            Self::WinArm64 => "win-arm64",
        }
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces the interpreter line written at the top of generated scripts.
pub trait ShebangStrategy: fmt::Debug + Send + Sync {
    /// Returns the shebang bytes, without a trailing newline.
    ///
    /// `for_launcher` is set when the script will be wrapped by a native
    /// launcher rather than executed directly.
    fn build(&self, interpreter: &str, for_launcher: bool) -> Vec<u8>;
}

/// Always writes the same shebang, whatever interpreter was configured.
///
/// The default line defers interpreter lookup to `PATH`, which keeps
/// installed scripts working when the environment is relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedShebang(String);

impl FixedShebang {
    /// Creates a strategy that always emits `line`.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }
}

impl Default for FixedShebang {
    fn default() -> Self {
        Self::new("#!/usr/bin/env python")
    }
}

impl ShebangStrategy for FixedShebang {
    fn build(&self, _interpreter: &str, _for_launcher: bool) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

/// Points scripts at the configured interpreter.
///
/// Paths that a kernel cannot take verbatim (too long, or containing
/// spaces) are wrapped in a `/bin/sh` trampoline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterShebang;

impl ShebangStrategy for InterpreterShebang {
    fn build(&self, interpreter: &str, for_launcher: bool) -> Vec<u8> {
        let simple = !interpreter.contains(' ') && interpreter.len() + 2 <= MAX_SHEBANG_LENGTH;
        if for_launcher || simple {
            let quoted = if interpreter.contains(' ') {
                format!("\"{interpreter}\"")
            } else {
                interpreter.to_owned()
            };
            return format!("#!{quoted}").into_bytes();
        }
        format!("#!/bin/sh\n'''exec' '{interpreter}' \"$0\" \"$@\"\n' '''").into_bytes()
    }
}

/// Which entry-point group a script came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptSection {
    /// `[console_scripts]`.
    Console,
    /// `[gui_scripts]`.
    Gui,
}

/// A command declared by a wheel's entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Command name, also the installed file name.
    pub name: String,
    /// Module to import.
    pub module: String,
    /// Dotted attribute path of the callable inside the module.
    pub attr: String,
    /// Group the command was declared in.
    pub section: ScriptSection,
}

impl Script {
    /// Renders the launcher for this script.
    ///
    /// Returns the file name and contents to install into `scripts`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::UnsupportedLauncher`] for Windows launcher
    /// kinds, which need native launcher executables.
    pub fn generate(
        &self,
        interpreter: &str,
        kind: LauncherKind,
        shebang: &dyn ShebangStrategy,
    ) -> Result<(String, Vec<u8>)> {
        if kind != LauncherKind::Posix {
            return Err(InstallerError::UnsupportedLauncher {
                kind: kind.to_string(),
            });
        }

        let import_name = self.attr.split('.').next().unwrap_or(&self.attr);
        let body = format!(
            "# -*- coding: utf-8 -*-\n\
             import re\n\
             import sys\n\
             from {module} import {import_name}\n\
             if __name__ == \"__main__\":\n\
             \x20   sys.argv[0] = re.sub(r\"(-script\\.pyw|\\.exe)?$\", \"\", sys.argv[0])\n\
             \x20   sys.exit({attr}())\n",
            module = self.module,
            attr = self.attr,
        );

        let mut contents = shebang.build(interpreter, false);
        contents.push(b'\n');
        contents.extend_from_slice(body.as_bytes());
        Ok((self.name.clone(), contents))
    }
}

/// Parses the console and GUI scripts out of `entry_points.txt`.
///
/// Other groups are ignored, as are comments, blank lines and extras
/// markers (`[extra]`) trailing a reference.
#[must_use]
pub fn parse_entry_points(contents: &str) -> Vec<Script> {
    let mut scripts = Vec::new();
    let mut section = None;

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = match name.trim() {
                "console_scripts" => Some(ScriptSection::Console),
                "gui_scripts" => Some(ScriptSection::Gui),
                _ => None,
            };
            continue;
        }
        let Some(current) = section else {
            continue;
        };
        if let Some(script) = parse_entry_point(line, current) {
            scripts.push(script);
        }
    }
    scripts
}

/// Parses `name = module:attr [extras]`.
fn parse_entry_point(line: &str, section: ScriptSection) -> Option<Script> {
    let (name, reference) = line.split_once('=')?;
    let reference = reference
        .split_once('[')
        .map_or(reference, |(head, _)| head)
        .trim();
    let (module, attr) = reference.split_once(':')?;
    let (name, module, attr) = (name.trim(), module.trim(), attr.trim());
    if name.is_empty() || module.is_empty() || attr.is_empty() {
        return None;
    }
    Some(Script {
        name: name.to_owned(),
        module: module.to_owned(),
        attr: attr.to_owned(),
        section,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn demo_script() -> Script {
        Script {
            name: "demo".to_owned(),
            module: "demo.cli".to_owned(),
            attr: "app.main".to_owned(),
            section: ScriptSection::Console,
        }
    }

    #[test]
    fn fixed_shebang_ignores_interpreter() {
        let strategy = FixedShebang::default();
        assert_eq!(
            strategy.build("/opt/env/bin/python3", false),
            b"#!/usr/bin/env python".to_vec()
        );
    }

    #[rstest]
    #[case::plain("/opt/env/bin/python", "#!/opt/env/bin/python")]
    #[case::spaces(
        "/opt/my env/bin/python",
        "#!/bin/sh\n'''exec' '/opt/my env/bin/python' \"$0\" \"$@\"\n' '''"
    )]
    fn interpreter_shebang_handles_awkward_paths(#[case] interpreter: &str, #[case] expected: &str) {
        let built = InterpreterShebang.build(interpreter, false);
        assert_eq!(String::from_utf8_lossy(&built), expected);
    }

    #[test]
    fn interpreter_shebang_quotes_for_launchers() {
        let built = InterpreterShebang.build("C:/Program Files/python.exe", true);
        assert_eq!(
            String::from_utf8_lossy(&built),
            "#!\"C:/Program Files/python.exe\""
        );
    }

    #[test]
    fn posix_script_imports_first_attribute_segment() {
        let (name, contents) = demo_script()
            .generate("/env/bin/python", LauncherKind::Posix, &FixedShebang::default())
            .expect("generate");
        let text = String::from_utf8(contents).expect("utf-8");

        assert_eq!(name, "demo");
        assert!(text.starts_with("#!/usr/bin/env python\n"));
        assert!(text.contains("from demo.cli import app\n"));
        assert!(text.contains("    sys.exit(app.main())\n"));
    }

    #[rstest]
    #[case(LauncherKind::WinAmd64)]
    #[case(LauncherKind::WinArm64)]
    fn windows_launchers_are_unsupported(#[case] kind: LauncherKind) {
        let result = demo_script().generate("python.exe", kind, &InterpreterShebang);
        assert!(matches!(
            result,
            Err(InstallerError::UnsupportedLauncher { kind: k }) if k == kind.as_str()
        ));
    }

    #[test]
    fn parses_console_and_gui_sections_only() {
        let contents = "\
[console_scripts]
demo = demo.cli:main
demo-extra = demo.cli:extra [fancy]
# comment
broken-line

[gui_scripts]
demo-gui = demo.gui:run

[demo.plugins]
ignored = demo.plugins:hook
";
        let scripts = parse_entry_points(contents);
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, ["demo", "demo-extra", "demo-gui"]);
        assert_eq!(scripts.get(1).map(|s| s.attr.as_str()), Some("extra"));
        assert_eq!(scripts.get(2).map(|s| s.section), Some(ScriptSection::Gui));
    }
}
