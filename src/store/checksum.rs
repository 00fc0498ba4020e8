use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Content digest of one partition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub algorithm: String,
    pub value: String,
}

impl FileDigest {
    /// Calculate SHA-256 hash of a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self {
            algorithm: "SHA-256".to_string(),
            value: hex::encode(hasher.finalize()),
        })
    }

    /// Calculate SHA-256 hash of data in memory
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);

        Self {
            algorithm: "SHA-256".to_string(),
            value: hex::encode(hasher.finalize()),
        }
    }

    /// Check the file still has this digest
    pub fn verify<P: AsRef<Path>>(&self, path: P) -> io::Result<bool> {
        let computed = Self::from_file(path)?;
        Ok(computed.value == self.value)
    }
}
