//! Content hashing.

use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{CoreError, CoreResult};

/// Files at or above this size (2 GiB) are not hashed.
pub const MAX_HASH_FILE_SIZE: u64 = 2_147_483_648;

/// Computes the MD5 of a file and returns it as a lowercase hex string.
///
/// The file is streamed, so memory use does not grow with its size.
pub fn md5_file(path: &Path) -> CoreResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| CoreError::from_io(path, e))?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Computes the MD5 of an in-memory buffer.
pub fn md5_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn md5_of_known_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();

        assert_eq!(md5_file(&path).unwrap(), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn md5_of_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        fs::write(&path, "").unwrap();

        assert_eq!(md5_file(&path).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn md5_file_matches_md5_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(md5_file(&path).unwrap(), md5_bytes(&data));
    }

    #[test]
    fn md5_missing_file_is_not_found() {
        let err = md5_file(Path::new("/nonexistent/file")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
