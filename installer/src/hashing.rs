//! Streaming copy with digest computation, and executable permissions.

use crate::record::{HashAlgorithm, RecordHash};
use std::io::{self, Read, Write};
use std::path::Path;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copies `reader` into `writer`, hashing the bytes as they pass through.
///
/// Returns the digest and the number of bytes copied.
///
/// # Errors
///
/// Returns any I/O error raised while reading or writing.
///
/// # Examples
///
/// ```
/// use wheelwright_installer::hashing::copy_with_hashing;
/// use wheelwright_installer::record::HashAlgorithm;
///
/// let mut out = Vec::new();
/// let (hash, size) = copy_with_hashing(&mut &b"print('hi')\n"[..], &mut out, HashAlgorithm::Sha256)?;
/// assert_eq!(size, 12);
/// assert_eq!(out, b"print('hi')\n");
/// assert!(hash.to_string().starts_with("sha256="));
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn copy_with_hashing(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    algorithm: HashAlgorithm,
) -> io::Result<(RecordHash, u64)> {
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        hasher.update(chunk);
        writer.write_all(chunk)?;
        size += chunk.len() as u64;
    }
    writer.flush()?;

    Ok((hasher.finish(), size))
}

/// Adds execute permission for every class that may read the file.
///
/// Mirrors `chmod +x` restricted by the existing read bits, so a `0o644`
/// file becomes `0o755` and a `0o600` file becomes `0o700`. A no-op on
/// platforms without Unix permissions.
///
/// # Errors
///
/// Returns an I/O error if the metadata cannot be read or updated.
pub fn make_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = std::fs::metadata(path)?.permissions();
        let mode = permissions.mode();
        // Read bits shifted down by two land on the matching execute bits.
        permissions.set_mode(mode | ((mode & 0o444) >> 2));
        std::fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that interrupts once before yielding its data.
    struct FlakyReader {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn copies_large_streams_across_buffer_boundaries() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251).to_le_bytes()[0]).collect();
        let mut out = Vec::new();

        let (hash, size) =
            copy_with_hashing(&mut Cursor::new(data.clone()), &mut out, HashAlgorithm::Sha256)
                .expect("copy");
        let (expected, _) =
            RecordHash::of_reader(HashAlgorithm::Sha256, &mut Cursor::new(data.clone()))
                .expect("hash");

        assert_eq!(out, data);
        assert_eq!(size, 200_000);
        assert_eq!(hash, expected);
    }

    #[test]
    fn retries_interrupted_reads() {
        let mut reader = FlakyReader {
            interrupted: false,
            inner: Cursor::new(b"abc".to_vec()),
        };
        let mut out = Vec::new();
        let (_, size) =
            copy_with_hashing(&mut reader, &mut out, HashAlgorithm::Sha256).expect("copy");
        assert_eq!(size, 3);
        assert_eq!(out, b"abc");
    }

    #[cfg(unix)]
    #[test]
    fn make_executable_follows_read_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("tool");
        std::fs::write(&path, b"#!/bin/sh\n").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640))
            .expect("chmod");

        make_executable(&path).expect("make executable");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }
}
