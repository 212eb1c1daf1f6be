//! RECORD manifest entries.
//!
//! Each installed file is described by a `path,hash,size` CSV row where the
//! hash is written as `<algorithm>=<urlsafe base64 digest without padding>`.
//! The RECORD file lists itself with empty hash and size columns.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Digest algorithms accepted in RECORD files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256, the algorithm written by default.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Name of the algorithm as it appears in RECORD.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Creates an incremental hasher for this algorithm.
    #[must_use]
    pub fn hasher(self) -> RecordHasher {
        match self {
            Self::Sha256 => RecordHasher::Sha256(Sha256::new()),
            Self::Sha384 => RecordHasher::Sha384(Sha384::new()),
            Self::Sha512 => RecordHasher::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unsupported hash algorithm {other}")),
        }
    }
}

/// Incremental digest state for one [`HashAlgorithm`].
#[derive(Debug, Clone)]
pub enum RecordHasher {
    /// SHA-256 state.
    Sha256(Sha256),
    /// SHA-384 state.
    Sha384(Sha384),
    /// SHA-512 state.
    Sha512(Sha512),
}

impl RecordHasher {
    /// Feeds `data` into the digest.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(data),
            Self::Sha384(hasher) => hasher.update(data),
            Self::Sha512(hasher) => hasher.update(data),
        }
    }

    /// Completes the digest and encodes it the way RECORD expects.
    #[must_use]
    pub fn finish(self) -> RecordHash {
        let (algorithm, digest) = match self {
            Self::Sha256(hasher) => (HashAlgorithm::Sha256, hasher.finalize().to_vec()),
            Self::Sha384(hasher) => (HashAlgorithm::Sha384, hasher.finalize().to_vec()),
            Self::Sha512(hasher) => (HashAlgorithm::Sha512, hasher.finalize().to_vec()),
        };
        RecordHash {
            algorithm: algorithm.as_str().to_owned(),
            value: URL_SAFE_NO_PAD.encode(digest),
        }
    }
}

/// A digest tagged with its algorithm.
///
/// The algorithm is kept as written so rows naming an algorithm this crate
/// cannot compute still parse; see [`RecordHash::supported_algorithm`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordHash {
    /// Name of the algorithm that produced the digest.
    pub algorithm: String,
    /// URL-safe base64 encoding of the digest, without padding.
    pub value: String,
}

impl RecordHash {
    /// The algorithm as a [`HashAlgorithm`], or `None` when unsupported.
    #[must_use]
    pub fn supported_algorithm(&self) -> Option<HashAlgorithm> {
        self.algorithm.parse().ok()
    }

    /// Hashes everything `reader` yields, returning the digest and byte count.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by `reader`.
    pub fn of_reader(algorithm: HashAlgorithm, reader: &mut dyn Read) -> std::io::Result<(Self, u64)> {
        let mut hasher = algorithm.hasher();
        let mut buffer = [0u8; 8192];
        let mut size = 0u64;
        loop {
            let read = reader.read(&mut buffer)?;
            let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
                break;
            };
            hasher.update(chunk);
            size += chunk.len() as u64;
        }
        Ok((hasher.finish(), size))
    }
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.value)
    }
}

impl FromStr for RecordHash {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('=') {
            Some((algorithm, digest)) if !algorithm.is_empty() => Ok(Self {
                algorithm: algorithm.to_owned(),
                value: digest.to_owned(),
            }),
            _ => Err(format!("hash {value} is not of the form algorithm=digest")),
        }
    }
}

/// One row of a RECORD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Path relative to the scheme the file was installed into.
    pub path: String,
    /// Digest of the file contents, absent for RECORD itself.
    pub hash: Option<RecordHash>,
    /// Size of the file in bytes, absent for RECORD itself.
    pub size: Option<u64>,
}

impl RecordEntry {
    /// Creates an entry describing a written file.
    #[must_use]
    pub fn new(path: impl Into<String>, hash: RecordHash, size: u64) -> Self {
        Self {
            path: path.into(),
            hash: Some(hash),
            size: Some(size),
        }
    }

    /// Creates an entry without hash or size, as used for RECORD itself.
    #[must_use]
    pub fn unhashed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: None,
            size: None,
        }
    }
}

/// A RECORD row that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("RECORD row {row}: {reason}")]
pub struct RecordParseError {
    /// One-based row number.
    pub row: usize,
    /// What was wrong with it.
    pub reason: String,
}

/// RECORD contents together with the rows that could not be fully read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Every row with a path, in file order.
    pub entries: Vec<RecordEntry>,
    /// Problems found while reading, one per offending column or row.
    pub issues: Vec<RecordParseError>,
}

/// Parses RECORD contents.
///
/// Parsing never fails outright. A row without a path is dropped, and a
/// malformed hash or size column is read as absent; each is reported in
/// [`ParsedRecord::issues`].
pub fn parse_record(reader: impl Read) -> ParsedRecord {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut parsed = ParsedRecord::default();
    for (index, result) in csv_reader.records().enumerate() {
        let row = index + 1;
        let mut issue = |reason: String| parsed.issues.push(RecordParseError { row, reason });
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let stop = matches!(err.kind(), csv::ErrorKind::Io(_));
                issue(err.to_string());
                if stop {
                    break;
                }
                continue;
            }
        };

        let Some(path) = record.get(0).filter(|path| !path.is_empty()) else {
            issue("missing path".to_owned());
            continue;
        };
        let hash = match record.get(1).filter(|hash| !hash.is_empty()) {
            Some(hash) => hash.parse::<RecordHash>().map_err(&mut issue).ok(),
            None => None,
        };
        let size = match record.get(2).filter(|size| !size.is_empty()) {
            Some(size) => size
                .parse::<u64>()
                .map_err(|err| issue(format!("invalid size {size}: {err}")))
                .ok(),
            None => None,
        };

        parsed.entries.push(RecordEntry {
            path: path.to_owned(),
            hash,
            size,
        });
    }
    parsed
}

/// Serializes entries as RECORD contents.
///
/// # Errors
///
/// Returns an I/O error if `writer` fails.
pub fn write_record<'a>(
    writer: impl Write,
    entries: impl IntoIterator<Item = &'a RecordEntry>,
) -> std::io::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    for entry in entries {
        let hash = entry.hash.as_ref().map(ToString::to_string).unwrap_or_default();
        let size = entry.size.map(|size| size.to_string()).unwrap_or_default();
        csv_writer.write_record([entry.path.as_str(), hash.as_str(), size.as_str()])?;
    }
    csv_writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    // sha256("hello world") in RECORD encoding.
    const HELLO_SHA256: &str = "uU0nuZNNPgilLlLX2n2r-sSE7-N6U4DukIj3rOLvzek";

    #[test]
    fn hashes_with_urlsafe_unpadded_base64() {
        let (hash, size) =
            RecordHash::of_reader(HashAlgorithm::Sha256, &mut Cursor::new(b"hello world"))
                .expect("hash");
        assert_eq!(hash.value, HELLO_SHA256);
        assert_eq!(size, 11);
        assert_eq!(hash.to_string(), format!("sha256={HELLO_SHA256}"));
    }

    #[rstest]
    #[case::sha384(HashAlgorithm::Sha384, 64)]
    #[case::sha512(HashAlgorithm::Sha512, 86)]
    fn longer_digests_encode_to_expected_width(
        #[case] algorithm: HashAlgorithm,
        #[case] encoded_len: usize,
    ) {
        let (hash, _) = RecordHash::of_reader(algorithm, &mut Cursor::new(b"x")).expect("hash");
        assert_eq!(hash.supported_algorithm(), Some(algorithm));
        assert_eq!(hash.value.len(), encoded_len);
        assert!(!hash.value.contains('='));
    }

    #[test]
    fn parses_rows_including_self_entry() {
        let contents = format!(
            "demo/__init__.py,sha256={HELLO_SHA256},11\n\
             \"demo/with,comma.txt\",sha256={HELLO_SHA256},11\n\
             demo-1.0.dist-info/RECORD,,\n"
        );
        let parsed = parse_record(contents.as_bytes());
        assert!(parsed.issues.is_empty());
        let entries = parsed.entries;

        assert_eq!(entries.len(), 3);
        assert_eq!(entries.first().map(|e| e.size), Some(Some(11)));
        assert_eq!(
            entries.get(1).map(|e| e.path.as_str()),
            Some("demo/with,comma.txt")
        );
        assert_eq!(
            entries.get(2),
            Some(&RecordEntry::unhashed("demo-1.0.dist-info/RECORD"))
        );
    }

    #[test]
    fn unknown_algorithms_parse_but_are_unsupported() {
        let parsed = parse_record("a.py,md5=abc,1\n".as_bytes());
        assert!(parsed.issues.is_empty());
        let hash = parsed
            .entries
            .first()
            .and_then(|entry| entry.hash.clone())
            .expect("hash column");
        assert_eq!(hash.algorithm, "md5");
        assert_eq!(hash.supported_algorithm(), None);
    }

    #[rstest]
    #[case::no_separator("a.py,abc,1\n", Some("a.py"))]
    #[case::bad_size("a.py,sha256=abc,many\n", Some("a.py"))]
    #[case::empty_path(",sha256=abc,1\n", None)]
    fn malformed_columns_become_issues(#[case] contents: &str, #[case] kept: Option<&str>) {
        let parsed = parse_record(contents.as_bytes());
        let rows: Vec<usize> = parsed.issues.iter().map(|issue| issue.row).collect();
        assert_eq!(rows, [1]);
        assert_eq!(
            parsed.entries.first().map(|entry| entry.path.as_str()),
            kept
        );
    }

    #[test]
    fn bad_rows_do_not_hide_later_rows() {
        let contents = format!("a.py,sha256=abc,many\nb.py,sha256={HELLO_SHA256},11\n");
        let parsed = parse_record(contents.as_bytes());

        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries.first().and_then(|entry| entry.size), None);
        assert_eq!(parsed.entries.get(1).and_then(|entry| entry.size), Some(11));
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn writes_rows_that_parse_back() {
        let hash: RecordHash = format!("sha256={HELLO_SHA256}").parse().expect("hash");
        let entries = vec![
            RecordEntry::new("demo/__init__.py", hash, 11),
            RecordEntry::unhashed("demo-1.0.dist-info/RECORD"),
        ];

        let mut out = Vec::new();
        write_record(&mut out, &entries).expect("write");
        let text = String::from_utf8(out).expect("utf-8");

        assert_eq!(
            text,
            format!("demo/__init__.py,sha256={HELLO_SHA256},11\ndemo-1.0.dist-info/RECORD,,\n")
        );
        assert_eq!(parse_record(text.as_bytes()).entries, entries);
    }
}
