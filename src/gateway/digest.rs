use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::constants::HASH_CHUNK_SIZE;
use crate::error::{PipelineError, Result};

/// Hex-encoded SHA-256 of a file's bytes, used as the dedupe key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileDigest(String);

impl FileDigest {
    /// Parse a stored digest, accepting only 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> FileDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    FileDigest(hex::encode(hasher.finalize()))
}

/// Hash a stream in fixed-size chunks so large files never sit in memory whole.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(FileDigest(hex::encode(hasher.finalize())))
}

/// Digest of the file at `path`, or `None` when nothing exists there.
pub fn hash_file(path: &Path) -> Result<Option<FileDigest>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No file to hash at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(PipelineError::io(format!("opening {}", path.display()), e)),
    };
    let digest = hash_reader(file)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
    Ok(Some(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vector() {
        let d = hash_bytes(b"abc");
        assert_eq!(
            d.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(d.short(), "ba7816bf8f01");
    }

    #[test]
    fn chunked_hash_matches_single_buffer() {
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        assert_eq!(hash_reader(Cursor::new(&data)).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(hash_file(&dir.path().join("nope.csv")).unwrap(), None);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(FileDigest::from_hex("xyz").is_none());
        assert!(FileDigest::from_hex(hash_bytes(b"").as_str()).is_some());
    }
}
