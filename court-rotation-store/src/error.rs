use std::path::PathBuf;

use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create snapshot directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode {name} snapshot: {source}")]
    Encode {
        name: &'static str,
        source: serde_json::Error,
    },
    #[error("Failed to write snapshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
