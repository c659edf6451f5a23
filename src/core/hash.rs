use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash computation failed: {message}")]
    ComputationFailed { message: String },
}

/// Computes a stable content fingerprint for a local file. The import
/// engine consumes this capability; the default implementation below is
/// SHA-256 over the raw bytes.
pub trait ContentHasher: Send + Sync {
    fn hash_file(&self, file_path: &Path) -> Result<String, HashError>;
}

pub struct Sha256Hasher;

impl Sha256Hasher {
    pub fn new() -> Self {
        Self
    }

    /// Verify if two files have the same content hash
    pub fn verify_identical_content(&self, file1: &Path, file2: &Path) -> Result<bool, HashError> {
        let hash1 = self.hash_file(file1)?;
        let hash2 = self.hash_file(file2)?;
        Ok(hash1 == hash2)
    }
}

impl ContentHasher for Sha256Hasher {
    /// Compute SHA-256 content hash used for exact duplicate detection
    fn hash_file(&self, file_path: &Path) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = [0; 8192]; // 8KB buffer for efficient reading

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        let result = hasher.finalize();
        Ok(format!("{:x}", result))
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}
