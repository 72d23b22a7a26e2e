use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::domain::types::ImagePath;
use crate::storage::{FileStorage, StorageResult};

/// Filesystem-backed public disk.
///
/// Files live under `root` and are served by the web server under
/// `public_url`.
#[derive(Debug, Clone)]
pub struct LocalPublicStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalPublicStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn absolute(&self, path: &ImagePath) -> PathBuf {
        self.root.join(path.as_str())
    }
}

impl FileStorage for LocalPublicStorage {
    fn put(
        &self,
        directory: &str,
        extension: &str,
        contents: &[u8],
    ) -> StorageResult<ImagePath> {
        let file_name = format!("{}.{extension}", Uuid::new_v4().simple());
        let path = ImagePath::new(format!("{}/{file_name}", directory.trim_matches('/')))?;

        let target = self.absolute(&path);
        let parent = target.parent().unwrap_or(self.root.as_path()).to_path_buf();
        std::fs::create_dir_all(&parent)?;

        // Stage next to the target so the final rename stays on one filesystem.
        let mut staged = NamedTempFile::new_in(&parent)?;
        staged.write_all(contents)?;
        staged.as_file().sync_all()?;
        staged.persist(&target)?;

        log::debug!("Stored {} bytes at {}", contents.len(), target.display());
        Ok(path)
    }

    fn delete(&self, path: &ImagePath) -> StorageResult<()> {
        match std::fs::remove_file(self.absolute(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &ImagePath) -> String {
        format!("{}/{}", self.public_url, path)
    }
}
