//! Public disk abstraction for uploaded files.

use thiserror::Error;

use crate::domain::types::{ImagePath, TypeConstraintError};

pub mod local;

pub use local::LocalPublicStorage;

/// Errors raised while writing or removing stored files.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to move file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("invalid storage path: {0}")]
    InvalidPath(#[from] TypeConstraintError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A disk whose files are reachable under a public URL.
pub trait FileStorage {
    /// Write `contents` under `directory` with a freshly generated file name
    /// ending in `extension`, returning the stored path.
    fn put(&self, directory: &str, extension: &str, contents: &[u8])
    -> StorageResult<ImagePath>;
    /// Remove a stored file. Removing a file that is already gone succeeds.
    fn delete(&self, path: &ImagePath) -> StorageResult<()>;
    /// Public URL of a stored file.
    fn url(&self, path: &ImagePath) -> String;
}

/// Remove a file whose owning record did not survive, logging instead of
/// failing the request.
pub fn discard<S>(storage: &S, path: &ImagePath)
where
    S: FileStorage + ?Sized,
{
    if let Err(e) = storage.delete(path) {
        log::warn!("Failed to remove stored file '{path}': {e}");
    }
}
