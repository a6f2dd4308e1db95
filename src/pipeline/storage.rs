// File system operations for pipeline outputs
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create every missing directory above `path`
pub fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

/// Write `value` as pretty JSON, creating parent directories first
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    ensure_parent_dir(path)?;
    let data = serde_json::to_vec_pretty(value)?;

    let mut file = fs::File::create(path).map_err(io_error(path))?;
    file.write_all(&data).map_err(io_error(path))?;
    file.flush().map_err(io_error(path))?;
    Ok(())
}

/// Read a JSON file back into `T`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let data = fs::read(path).map_err(io_error(path))?;
    Ok(serde_json::from_slice(&data)?)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
