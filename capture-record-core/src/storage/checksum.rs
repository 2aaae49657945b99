use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;

/// Compute SHA-256 hex digest of a file.
///
/// Streams the file in 64 KiB blocks so long video recordings are not loaded
/// into memory.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to open file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut block)
            .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn checksum_of_known_content() {
        let path = std::env::temp_dir().join(format!("capture_record_checksum_{}.bin", uuid::Uuid::new_v4()));
        fs::write(&path, b"abc").unwrap();

        let checksum = sha256_file(&path).unwrap();
        assert_eq!(
            checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_a_storage_error() {
        let path = std::env::temp_dir().join("capture_record_checksum_missing.bin");
        assert!(matches!(sha256_file(&path), Err(CaptureError::StorageError(_))));
    }
}
