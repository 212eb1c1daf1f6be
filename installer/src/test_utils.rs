//! Shared test utilities for the installer crate.

use crate::command::CommandExecutor;
use crate::error::{InstallerError, Result};
use crate::record::{HashAlgorithm, RecordEntry, RecordHash, write_record};
use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Output};
use zip::write::SimpleFileOptions;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    output_with_stdout("")
}

/// Creates a successful command `Output` with the given stdout.
pub fn output_with_stdout(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "python").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(InstallerError::StubMismatch {
                message: format!("unexpected invocation of {cmd} {args:?}"),
            });
        };

        if call.cmd != cmd || call.args.as_slice() != args {
            return Err(InstallerError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {cmd} {args:?}",
                    call.cmd, call.args
                ),
            });
        }

        call.result
    }
}

#[derive(Debug, Clone)]
enum Listing {
    Hashed,
    Unlisted,
    Unhashed,
    Tampered(Vec<u8>),
    Custom(RecordHash),
}

#[derive(Debug, Clone)]
struct BuilderEntry {
    path: String,
    contents: Vec<u8>,
    mode: u32,
    listing: Listing,
}

/// Writes small wheel archives for tests.
///
/// RECORD is generated from the added files unless a file is deliberately
/// left out of it or given a wrong digest.
#[derive(Debug, Clone)]
pub struct WheelBuilder {
    distribution: String,
    version: String,
    root_is_purelib: bool,
    entry_points: Option<String>,
    with_dist_info: bool,
    with_record: bool,
    entries: Vec<BuilderEntry>,
    record_only: Vec<String>,
}

impl WheelBuilder {
    /// Starts a wheel for `distribution` at `version`.
    pub fn new(distribution: &str, version: &str) -> Self {
        Self {
            distribution: distribution.to_owned(),
            version: version.to_owned(),
            root_is_purelib: true,
            entry_points: None,
            with_dist_info: true,
            with_record: true,
            entries: Vec::new(),
            record_only: Vec::new(),
        }
    }

    fn push(mut self, path: &str, contents: &[u8], mode: u32, listing: Listing) -> Self {
        self.entries.push(BuilderEntry {
            path: path.to_owned(),
            contents: contents.to_vec(),
            mode,
            listing,
        });
        self
    }

    /// Adds a regular file at `path`.
    #[must_use]
    pub fn file(self, path: &str, contents: &[u8]) -> Self {
        self.push(path, contents, 0o644, Listing::Hashed)
    }

    /// Adds a file the archive marks as executable.
    #[must_use]
    pub fn executable_file(self, path: &str, contents: &[u8]) -> Self {
        self.push(path, contents, 0o755, Listing::Hashed)
    }

    /// Adds a file under the `.data/<scheme>/` directory.
    #[must_use]
    pub fn data_file(self, scheme: &str, path: &str, contents: &[u8]) -> Self {
        let full = format!("{}/{scheme}/{path}", self.data_dir());
        self.push(&full, contents, 0o644, Listing::Hashed)
    }

    /// Adds a file that RECORD does not mention.
    #[must_use]
    pub fn unlisted_file(self, path: &str, contents: &[u8]) -> Self {
        self.push(path, contents, 0o644, Listing::Unlisted)
    }

    /// Adds a file listed in RECORD without a digest.
    #[must_use]
    pub fn unhashed_file(self, path: &str, contents: &[u8]) -> Self {
        self.push(path, contents, 0o644, Listing::Unhashed)
    }

    /// Adds a file whose RECORD digest describes `recorded` while the
    /// archive holds `actual`.
    #[must_use]
    pub fn tampered_file(self, path: &str, recorded: &[u8], actual: &[u8]) -> Self {
        self.push(path, actual, 0o644, Listing::Tampered(recorded.to_vec()))
    }

    /// Adds a file whose RECORD row carries `algorithm=digest` verbatim.
    #[must_use]
    pub fn file_with_hash(self, path: &str, contents: &[u8], algorithm: &str, digest: &str) -> Self {
        let hash = RecordHash {
            algorithm: algorithm.to_owned(),
            value: digest.to_owned(),
        };
        self.push(path, contents, 0o644, Listing::Custom(hash))
    }

    /// Lists `path` in RECORD without storing it in the archive.
    #[must_use]
    pub fn record_only(mut self, path: &str) -> Self {
        self.record_only.push(path.to_owned());
        self
    }

    /// Sets the `entry_points.txt` contents.
    #[must_use]
    pub fn entry_points(mut self, contents: &str) -> Self {
        self.entry_points = Some(contents.to_owned());
        self
    }

    /// Marks the wheel as platform specific.
    #[must_use]
    pub fn platlib(mut self) -> Self {
        self.root_is_purelib = false;
        self
    }

    /// Omits the `.dist-info` directory entirely.
    #[must_use]
    pub fn without_dist_info(mut self) -> Self {
        self.with_dist_info = false;
        self
    }

    /// Omits RECORD from the `.dist-info` directory.
    #[must_use]
    pub fn without_record(mut self) -> Self {
        self.with_record = false;
        self
    }

    /// File name the wheel is written under.
    pub fn file_name(&self) -> String {
        format!("{}-{}-py3-none-any.whl", self.distribution, self.version)
    }

    fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", self.distribution, self.version)
    }

    fn data_dir(&self) -> String {
        format!("{}-{}.data", self.distribution, self.version)
    }

    /// Writes the wheel into `dir` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns I/O or zip errors raised while writing the archive, or
    /// [`InstallerError::InvalidWheel`] if `dir` is not valid UTF-8.
    pub fn build(&self, dir: &Path) -> Result<Utf8PathBuf> {
        let path = Utf8PathBuf::try_from(dir.join(self.file_name())).map_err(|err| {
            InstallerError::InvalidWheel {
                path: Utf8PathBuf::from(self.file_name()),
                reason: err.to_string(),
            }
        })?;

        let mut entries = self.entries.clone();
        if self.with_dist_info {
            entries.extend(self.metadata_entries());
        }

        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path)?);
        let mut record = Vec::new();
        for entry in &entries {
            let options = SimpleFileOptions::default().unix_permissions(entry.mode);
            writer.start_file(entry.path.as_str(), options)?;
            writer.write_all(&entry.contents)?;
            if let Some(row) = record_row(entry)? {
                record.push(row);
            }
        }

        if self.with_dist_info && self.with_record {
            let record_path = format!("{}/RECORD", self.dist_info_dir());
            for path in &self.record_only {
                let (hash, size) = RecordHash::of_reader(HashAlgorithm::Sha256, &mut &b""[..])?;
                record.push(RecordEntry::new(path.as_str(), hash, size));
            }
            record.push(RecordEntry::unhashed(record_path.as_str()));
            let mut contents = Vec::new();
            write_record(&mut contents, &record)?;
            writer.start_file(record_path.as_str(), SimpleFileOptions::default())?;
            writer.write_all(&contents)?;
        }
        writer.finish()?;
        Ok(path)
    }

    fn metadata_entries(&self) -> Vec<BuilderEntry> {
        let dist_info = self.dist_info_dir();
        let mut entries = vec![
            BuilderEntry {
                path: format!("{dist_info}/WHEEL"),
                contents: format!(
                    "Wheel-Version: 1.0\nGenerator: wheelwright-tests\nRoot-Is-Purelib: {}\nTag: py3-none-any\n",
                    self.root_is_purelib
                )
                .into_bytes(),
                mode: 0o644,
                listing: Listing::Hashed,
            },
            BuilderEntry {
                path: format!("{dist_info}/METADATA"),
                contents: format!(
                    "Metadata-Version: 2.1\nName: {}\nVersion: {}\n",
                    self.distribution, self.version
                )
                .into_bytes(),
                mode: 0o644,
                listing: Listing::Hashed,
            },
        ];
        if let Some(entry_points) = &self.entry_points {
            entries.push(BuilderEntry {
                path: format!("{dist_info}/entry_points.txt"),
                contents: entry_points.as_bytes().to_vec(),
                mode: 0o644,
                listing: Listing::Hashed,
            });
        }
        entries
    }
}

fn record_row(entry: &BuilderEntry) -> Result<Option<RecordEntry>> {
    let hashed = |bytes: &[u8]| -> Result<RecordEntry> {
        let (hash, size) = RecordHash::of_reader(HashAlgorithm::Sha256, &mut &bytes[..])?;
        Ok(RecordEntry::new(entry.path.as_str(), hash, size))
    };
    Ok(match &entry.listing {
        Listing::Hashed => Some(hashed(&entry.contents)?),
        Listing::Unlisted => None,
        Listing::Unhashed => Some(RecordEntry::unhashed(entry.path.as_str())),
        Listing::Tampered(recorded) => Some(hashed(recorded)?),
        Listing::Custom(hash) => Some(RecordEntry::new(
            entry.path.as_str(),
            hash.clone(),
            entry.contents.len() as u64,
        )),
    })
}
