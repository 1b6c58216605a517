use tokio::fs;
use std::path::Path;
use anyhow::Result;
use log::{error, info};

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Renders bytes as uppercase hex pairs in wire order, e.g. `[0x0A, 0x1F]` -> `"0A1F"`.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Inverse of [`to_hex`]. Accepts either case.
pub fn from_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rendering() {
        assert_eq!(to_hex(&[0x01]), "01");
        assert_eq!(to_hex(&[0x0A, 0x1F]), "0A1F");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_hex_decodes_what_it_renders() {
        for bytes in [vec![], vec![0x00], vec![0xFF, 0x10, 0xAB], (0u8..=255).collect()] {
            assert_eq!(from_hex(&to_hex(&bytes)).unwrap(), bytes);
        }
        assert!(from_hex("0G").is_err());
    }

    #[tokio::test]
    async fn test_ensure_directory_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory_exists(&nested).await.unwrap();
        ensure_directory_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
