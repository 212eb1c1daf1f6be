//! Extracts an open wheel into a destination.
//!
//! [`install`] is the archive-to-filesystem procedure shared by every
//! caller: it routes each archived file to its scheme, rewrites `#!python`
//! shebangs, generates entry-point launchers, adds caller metadata to the
//! `.dist-info` directory, optionally byte-compiles the installed modules
//! and finally writes a fresh RECORD describing what landed on disk.

use crate::destination::SchemeDestination;
use crate::environment::PythonEnvironment;
use crate::error::{InstallerError, Result};
use crate::record::{RecordEntry, write_record};
use crate::scheme::Scheme;
use crate::scripts::parse_entry_points;
use crate::wheel::{WheelFile, is_record_file};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::collections::BTreeSet;
use std::io::Read;

/// One `compileall` run over a set of installed modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Absolute paths of the `.py` files to compile.
    pub files: Vec<Utf8PathBuf>,
    /// Optimization level; negative means the interpreter default.
    pub level: i8,
    /// Staging root to strip from the paths embedded in bytecode.
    pub strip_prefix: Option<Utf8PathBuf>,
}

impl CompileRequest {
    /// Interpreter arguments performing this request.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-m".to_owned(), "compileall".to_owned(), "-q".to_owned()];
        if self.level >= 0 {
            args.push("-o".to_owned());
            args.push(self.level.to_string());
        }
        if let Some(prefix) = &self.strip_prefix {
            args.extend(["-s".to_owned(), prefix.to_string(), "-p".to_owned(), "/".to_owned()]);
        }
        args.extend(self.files.iter().map(ToString::to_string));
        args
    }
}

/// Compiles installed modules to bytecode.
#[cfg_attr(test, mockall::automock)]
pub trait BytecodeCompiler {
    /// Runs one compilation request.
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying compiler run.
    fn compile(&self, request: &CompileRequest) -> Result<()>;
}

/// Compiles with the environment's own interpreter via `compileall`.
#[derive(Debug)]
pub struct CompileAll<'a, E: ?Sized>(pub &'a E);

impl<E: PythonEnvironment + ?Sized> BytecodeCompiler for CompileAll<'_, E> {
    fn compile(&self, request: &CompileRequest) -> Result<()> {
        self.0.run_python(&request.to_args()).map(drop)
    }
}

/// Installs `source` into `destination`.
///
/// Every file the archive holds is installed, whether or not the wheel's
/// RECORD lists it; rows naming files the archive lacks are ignored.
/// `additional_metadata` pairs a file name with its contents; each is
/// written into the installed `.dist-info` directory and listed in RECORD.
/// `compiler` is only consulted when the destination has bytecode
/// optimization levels set.
///
/// # Errors
///
/// Returns [`InstallerError::InvalidWheel`] for unreadable metadata or
/// unknown `.data` schemes, [`InstallerError::InvalidEntryPath`] for paths
/// escaping their scheme, lookup and I/O errors from the destination, and
/// compiler failures.
pub fn install(
    source: &mut WheelFile,
    destination: &SchemeDestination,
    additional_metadata: &[(&str, &[u8])],
    compiler: &dyn BytecodeCompiler,
) -> Result<()> {
    let root_scheme = if source.root_is_purelib()? {
        Scheme::Purelib
    } else {
        Scheme::Platlib
    };
    let dist_info = source.dist_info_dir();
    let record_path = format!("{dist_info}/RECORD");
    let data_prefix = format!("{}/", source.data_dir());
    let replaced: BTreeSet<String> = additional_metadata
        .iter()
        .map(|(name, _)| format!("{dist_info}/{name}"))
        .collect();

    let mut installed = Installed::new(destination, root_scheme);
    for entry in source.entries()? {
        let name = entry.name;
        if is_record_file(&name, &record_path) || replaced.contains(&name) {
            continue;
        }
        let (scheme, relative) = route(&name, &data_prefix, root_scheme)
            .map_err(|reason| InstallerError::InvalidWheel {
                path: source.path().to_owned(),
                reason,
            })?;
        trace!("installing {name} into {scheme}");

        let mut reader = source.open_entry(&name)?;
        if scheme == Scheme::Scripts {
            let mut contents = Vec::new();
            reader.read_to_end(&mut contents)?;
            if let Some(rewritten) = rewrite_shebang(&contents, destination) {
                installed.write(scheme, relative, &mut rewritten.as_slice(), true)?;
                continue;
            }
            installed.write(scheme, relative, &mut contents.as_slice(), entry.executable)?;
        } else {
            installed.write(scheme, relative, &mut reader, entry.executable)?;
        }
    }

    if let Some(entry_points) = source.entry_points()? {
        for script in parse_entry_points(&entry_points) {
            debug!("generating launcher {}", script.name);
            let record = destination.write_script(&script)?;
            installed.push(Scheme::Scripts, record)?;
        }
    }

    for &(name, contents) in additional_metadata {
        let relative = format!("{dist_info}/{name}");
        let mut reader = contents;
        installed.write(root_scheme, &relative, &mut reader, false)?;
    }

    installed.compile(compiler)?;
    installed.finish(&record_path)
}

/// Files written so far, in RECORD form.
struct Installed<'a> {
    destination: &'a SchemeDestination,
    root_scheme: Scheme,
    root_base: Utf8PathBuf,
    records: Vec<RecordEntry>,
    modules: Vec<Utf8PathBuf>,
}

impl<'a> Installed<'a> {
    fn new(destination: &'a SchemeDestination, root_scheme: Scheme) -> Self {
        Self {
            destination,
            root_scheme,
            root_base: Utf8PathBuf::new(),
            records: Vec::new(),
            modules: Vec::new(),
        }
    }

    fn write(
        &mut self,
        scheme: Scheme,
        relative: &str,
        reader: &mut dyn Read,
        is_executable: bool,
    ) -> Result<()> {
        let record = self
            .destination
            .write_file(scheme, relative, reader, is_executable)?;
        if scheme.is_library() && relative.ends_with(".py") {
            self.modules
                .push(self.destination.path_with_destdir(scheme, relative)?);
        }
        self.push(scheme, record)
    }

    /// Records a written file, rebasing its path onto the root scheme.
    fn push(&mut self, scheme: Scheme, mut record: RecordEntry) -> Result<()> {
        if scheme != self.root_scheme {
            if self.root_base.as_str().is_empty() {
                self.root_base = self.destination.resolve_base(self.root_scheme)?;
            }
            let target = self.destination.resolve_base(scheme)?.join(&record.path);
            record.path = relative_path(&self.root_base, &target).into_string();
        }
        self.records.push(record);
        Ok(())
    }

    fn compile(&self, compiler: &dyn BytecodeCompiler) -> Result<()> {
        if self.modules.is_empty() {
            return Ok(());
        }
        for &level in self.destination.bytecode_optimization_levels() {
            debug!("compiling {} modules at level {level}", self.modules.len());
            compiler.compile(&CompileRequest {
                files: self.modules.clone(),
                level,
                strip_prefix: self.destination.destdir().map(Utf8Path::to_path_buf),
            })?;
        }
        Ok(())
    }

    fn finish(mut self, record_path: &str) -> Result<()> {
        self.records.push(RecordEntry::unhashed(record_path));
        let mut contents = Vec::new();
        write_record(&mut contents, &self.records)?;
        self.destination
            .write_file(self.root_scheme, record_path, &mut contents.as_slice(), false)?;
        Ok(())
    }
}

/// Maps an archive path to its scheme and scheme-relative path.
fn route<'n>(
    name: &'n str,
    data_prefix: &str,
    root_scheme: Scheme,
) -> std::result::Result<(Scheme, &'n str), String> {
    let Some(rest) = name.strip_prefix(data_prefix) else {
        return Ok((root_scheme, name));
    };
    let (scheme_name, relative) = rest
        .split_once('/')
        .filter(|(_, relative)| !relative.is_empty())
        .ok_or_else(|| format!("{name} is not inside a scheme directory"))?;
    let scheme = scheme_name
        .parse::<Scheme>()
        .map_err(|_| format!("{name} uses unknown scheme {scheme_name}"))?;
    Ok((scheme, relative))
}

/// Replaces a `#!python` or `#!pythonw` first line with the destination's
/// shebang, keeping any interpreter arguments.
fn rewrite_shebang(contents: &[u8], destination: &SchemeDestination) -> Option<Vec<u8>> {
    let rest = contents
        .strip_prefix(b"#!pythonw")
        .or_else(|| contents.strip_prefix(b"#!python"))?;
    if rest.first().is_some_and(|byte| !byte.is_ascii_whitespace()) {
        return None;
    }
    let mut rewritten = destination.script_shebang();
    rewritten.extend_from_slice(rest);
    Some(rewritten)
}

/// Path of `to` relative to the directory `from`.
fn relative_path(from: &Utf8Path, to: &Utf8Path) -> Utf8PathBuf {
    let common = from
        .components()
        .zip(to.components())
        .take_while(|(left, right)| left == right)
        .count();
    if common == 0 {
        return to.to_path_buf();
    }
    let mut relative = Utf8PathBuf::new();
    for _ in from.components().skip(common) {
        relative.push("..");
    }
    for component in to.components().skip(common) {
        relative.push(component.as_str());
    }
    relative
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
