// src/hash.rs

//! Package checksums
//!
//! Mirrors publish archive hashes as prefixed strings (`sha256:<hex>`), and
//! OCI blobs are addressed by the same form of digest. Only SHA-256 is
//! accepted for verification; other prefixes are carried through untouched so
//! a mirror listing several hash schemes still parses.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Length of a SHA-256 digest in hex characters
const SHA256_HEX_LEN: usize = 64;

/// A `sha256:<hex>` package checksum
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageHash {
    value: String,
}

impl PackageHash {
    /// Parse a prefixed hash string; returns `None` for other schemes
    pub fn parse_prefixed(s: &str) -> Option<Self> {
        let hex_value = s.strip_prefix("sha256:")?;
        if hex_value.len() != SHA256_HEX_LEN || !hex_value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            value: hex_value.to_lowercase(),
        })
    }

    /// Wrap an already computed hex digest
    pub fn from_hex(hex_value: impl Into<String>) -> Self {
        Self {
            value: hex_value.into().to_lowercase(),
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for PackageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.value)
    }
}

/// SHA-256 of a byte slice, as lowercase hex
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of a reader's content
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected checksum
///
/// Streams the file content to avoid loading it entirely into memory.
pub fn verify_file(path: &Path, expected: &PackageHash) -> Result<()> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let actual = sha256_reader(&mut file)?;

    if actual == expected.as_hex() {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: format!("sha256:{}", actual),
        })
    }
}
