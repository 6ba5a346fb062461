//! JSON file persistence for settings and high scores
//!
//! Saves go to a temporary sibling file first and are renamed into place,
//! so a crash mid-write never leaves a truncated file behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and decode a JSON file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PersistenceError::NotFound(path.to_path_buf())
        } else {
            PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode and write a JSON file atomically
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_errors() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("block-impact-persist-{}.json", std::process::id()));

        save_json(&path, &vec![1u32, 2, 3]).unwrap();
        let loaded: Vec<u32> = load_json(&path).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_json::<Vec<u32>>(&path),
            Err(PersistenceError::Json { .. })
        ));

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            load_json::<Vec<u32>>(&path),
            Err(PersistenceError::NotFound(_))
        ));
    }
}
