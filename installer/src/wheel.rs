//! Read access to wheel archives.
//!
//! A wheel is a zip file named
//! `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
//! holding the package files, a `{distribution}-{version}.dist-info`
//! metadata directory and, optionally, a `.data` directory with files for
//! non-library schemes.

use crate::error::{InstallerError, Result};
use crate::record::{HashAlgorithm, RecordEntry, RecordHash, parse_record};
use camino::{Utf8Path, Utf8PathBuf};
use log::trace;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use zip::ZipArchive;

/// Record validation found problems with a wheel.
///
/// This is not fatal to installation; the installer logs the issues and
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} has an invalid RECORD: {}", .wheel, .issues.join("; "))]
pub struct WheelValidationError {
    /// File name of the wheel that failed validation.
    pub wheel: String,
    /// Every problem found, in archive order.
    pub issues: Vec<String>,
}

/// A file stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelEntry {
    /// Path inside the archive.
    pub name: String,
    /// The RECORD row describing the file, if RECORD lists it.
    pub record: Option<RecordEntry>,
    /// Whether the archive marks the file as executable.
    pub executable: bool,
}

/// An open wheel archive.
///
/// The underlying file handle is released when the value is dropped.
#[derive(Debug)]
pub struct WheelFile {
    path: Utf8PathBuf,
    distribution: String,
    version: String,
    archive: ZipArchive<BufReader<File>>,
}

impl WheelFile {
    /// Opens the wheel at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidWheel`] if the file name does not
    /// follow the wheel naming convention or the archive lacks its
    /// `.dist-info` directory, and I/O or zip errors if it cannot be read.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let (distribution, version) = parse_wheel_filename(path)?;
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        let wheel = Self {
            path: path.to_owned(),
            distribution,
            version,
            archive,
        };

        let dist_info = wheel.dist_info_dir();
        let prefix = format!("{dist_info}/");
        if !wheel.archive.file_names().any(|name| name.starts_with(&prefix)) {
            return Err(wheel.invalid(format!("missing {dist_info} directory")));
        }
        trace!("opened wheel {path} ({} entries)", wheel.archive.len());
        Ok(wheel)
    }

    /// Path the wheel was opened from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Distribution name, as spelled in the file name.
    #[must_use]
    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    /// Distribution version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the metadata directory.
    #[must_use]
    pub fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", self.distribution, self.version)
    }

    /// Name of the directory holding files for non-library schemes.
    #[must_use]
    pub fn data_dir(&self) -> String {
        format!("{}-{}.data", self.distribution, self.version)
    }

    /// Reads a file from the `.dist-info` directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidWheel`] if the file is missing.
    pub fn read_dist_info(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = format!("{}/{name}", self.dist_info_dir());
        self.read_optional(&path)?
            .ok_or_else(|| self.invalid(format!("missing {path}")))
    }

    /// Parses the `WHEEL` metadata file into its key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidWheel`] if the file is missing or
    /// not UTF-8.
    pub fn wheel_metadata(&mut self) -> Result<BTreeMap<String, String>> {
        let raw = self.read_dist_info("WHEEL")?;
        let text = String::from_utf8(raw).map_err(|_| self.invalid("WHEEL is not UTF-8"))?;
        Ok(text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            .collect())
    }

    /// Returns `true` when the wheel installs into `purelib` by default.
    ///
    /// # Errors
    ///
    /// See [`Self::wheel_metadata`].
    pub fn root_is_purelib(&mut self) -> Result<bool> {
        let metadata = self.wheel_metadata()?;
        Ok(metadata
            .get("Root-Is-Purelib")
            .is_some_and(|value| value.eq_ignore_ascii_case("true")))
    }

    /// Returns the contents of `entry_points.txt`, if the wheel has one.
    ///
    /// # Errors
    ///
    /// Returns I/O or zip errors if the entry cannot be read.
    pub fn entry_points(&mut self) -> Result<Option<String>> {
        let path = format!("{}/entry_points.txt", self.dist_info_dir());
        Ok(self
            .read_optional(&path)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Parses the wheel's RECORD.
    ///
    /// Rows that cannot be fully read are kept as far as possible; use
    /// [`Self::validate_record`] to learn what was wrong with them.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidWheel`] if RECORD is missing.
    pub fn records(&mut self) -> Result<Vec<RecordEntry>> {
        let raw = self.read_dist_info("RECORD")?;
        Ok(parse_record(raw.as_slice()).entries)
    }

    /// Lists the files stored in the archive, in archive order, each with
    /// its RECORD row when RECORD has one.
    ///
    /// Directories are skipped. RECORD rows naming files the archive does
    /// not hold are ignored, and a missing RECORD leaves every row empty.
    ///
    /// # Errors
    ///
    /// Returns I/O or zip errors if the archive cannot be read.
    pub fn entries(&mut self) -> Result<Vec<WheelEntry>> {
        let record_path = format!("{}/RECORD", self.dist_info_dir());
        let mut listed: BTreeMap<String, RecordEntry> = self
            .read_optional(&record_path)?
            .map(|raw| parse_record(raw.as_slice()).entries)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();

        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let file = self.archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            let executable = file.unix_mode().is_some_and(|mode| mode & 0o111 != 0);
            let record = listed.remove(&name);
            entries.push(WheelEntry {
                name,
                record,
                executable,
            });
        }
        Ok(entries)
    }

    /// Opens an archive member for streaming.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidWheel`] if the archive does not
    /// contain `name`.
    pub fn open_entry(&mut self, name: &str) -> Result<impl Read + '_> {
        match self.archive.by_name(name) {
            Ok(file) => Ok(file),
            Err(zip::result::ZipError::FileNotFound) => Err(InstallerError::InvalidWheel {
                path: self.path.clone(),
                reason: format!("the archive does not contain {name}"),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks RECORD against the archive contents.
    ///
    /// Every RECORD row must be readable and name an archived file, every
    /// file must be listed, every listed file other than RECORD and its
    /// signatures must carry a hash in a supported algorithm, and with
    /// `validate_contents` each digest and size must match the archived
    /// bytes. All problems are collected rather than stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns [`WheelValidationError`] carrying every issue found.
    pub fn validate_record(
        &mut self,
        validate_contents: bool,
    ) -> std::result::Result<(), WheelValidationError> {
        let record_path = format!("{}/RECORD", self.dist_info_dir());
        let wheel = self.file_name();
        let fail = |issues: Vec<String>| WheelValidationError {
            wheel: wheel.clone(),
            issues,
        };

        let raw = match self.read_optional(&record_path) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(fail(vec![format!("{record_path} not found")])),
            Err(err) => return Err(fail(vec![format!("cannot read {record_path}: {err}")])),
        };
        let parsed = parse_record(raw.as_slice());
        let mut issues: Vec<String> = parsed
            .issues
            .iter()
            .map(|err| format!("{record_path}: {err}"))
            .collect();

        let listed: BTreeMap<&str, &RecordEntry> = parsed
            .entries
            .iter()
            .map(|entry| (entry.path.as_str(), entry))
            .collect();
        let archived: BTreeSet<String> = self
            .archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_owned)
            .collect();

        for path in listed.keys() {
            if !path.ends_with('/') && !archived.contains(*path) {
                issues.push(format!("{path} is listed in RECORD but not in the archive"));
            }
        }

        for name in &archived {
            let Some(entry) = listed.get(name.as_str()) else {
                issues.push(format!("{name} not mentioned in RECORD"));
                continue;
            };
            if is_record_file(name, &record_path) {
                continue;
            }
            let Some(expected) = &entry.hash else {
                issues.push(format!("{name} has no hash in RECORD"));
                continue;
            };
            let Some(algorithm) = expected.supported_algorithm() else {
                issues.push(format!(
                    "{name} uses unsupported hash algorithm {}",
                    expected.algorithm
                ));
                continue;
            };
            if validate_contents {
                if let Some(issue) = self.check_contents(name, algorithm, expected, entry.size) {
                    issues.push(issue);
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(fail(issues))
        }
    }

    fn check_contents(
        &mut self,
        name: &str,
        algorithm: HashAlgorithm,
        expected: &RecordHash,
        expected_size: Option<u64>,
    ) -> Option<String> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(err) => return Some(format!("{name} cannot be read: {err}")),
        };
        let (actual, size) = match RecordHash::of_reader(algorithm, &mut file) {
            Ok(result) => result,
            Err(err) => return Some(format!("{name} cannot be read: {err}")),
        };
        if actual.value != expected.value {
            return Some(format!("hash of {name} does not match RECORD"));
        }
        if expected_size.is_some_and(|expected| expected != size) {
            return Some(format!("size of {name} does not match RECORD"));
        }
        None
    }

    fn read_optional(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(Some(contents))
    }

    fn file_name(&self) -> String {
        self.path.file_name().unwrap_or(self.path.as_str()).to_owned()
    }

    fn invalid(&self, reason: impl Into<String>) -> InstallerError {
        InstallerError::InvalidWheel {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// RECORD and its signature files are exempt from hashing.
pub(crate) fn is_record_file(name: &str, record_path: &str) -> bool {
    name == record_path
        || name
            .strip_prefix(record_path)
            .is_some_and(|suffix| suffix == ".jws" || suffix == ".p7s")
}

/// Extracts the distribution and version from a wheel file name.
fn parse_wheel_filename(path: &Utf8Path) -> Result<(String, String)> {
    let invalid = |reason: &str| InstallerError::InvalidWheel {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };
    let stem = path
        .file_name()
        .and_then(|name| name.strip_suffix(".whl"))
        .ok_or_else(|| invalid("file name does not end in .whl"))?;

    let parts: Vec<&str> = stem.split('-').collect();
    match parts.as_slice() {
        [distribution, version, _python, _abi, _platform]
        | [distribution, version, _, _python, _abi, _platform]
            if !distribution.is_empty() && !version.is_empty() =>
        {
            Ok(((*distribution).to_owned(), (*version).to_owned()))
        }
        _ => Err(invalid("file name does not follow the wheel naming convention")),
    }
}
