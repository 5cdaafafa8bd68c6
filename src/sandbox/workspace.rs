use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Ephemeral directory owned by exactly one execution attempt.
///
/// Removal is best-effort and happens either through [`JobDirectory::remove`]
/// or on drop, so the directory is gone even when the owning future is
/// cancelled or panics.
#[derive(Debug)]
pub struct JobDirectory {
    path: PathBuf,
    removed: bool,
}

impl JobDirectory {
    /// Create a fresh, uniquely named directory under `root`, creating `root`
    /// itself if needed. The stored path is absolute.
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let root = tokio::fs::canonicalize(root).await?;
        let path = root.join(format!("job-{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to `name` inside the directory.
    pub async fn write_file(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let file = self.path.join(name);
        tokio::fs::write(&file, contents).await?;
        Ok(file)
    }

    /// Remove the directory tree without blocking the runtime. Never fails.
    pub async fn remove(mut self) {
        let result = tokio::fs::remove_dir_all(&self.path).await;
        // Set only once the delete finished; a cancelled remove falls back to Drop.
        self.removed = true;
        self.report(result);
    }

    /// Synchronous removal, only used from `Drop`.
    fn remove_now(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        let result = std::fs::remove_dir_all(&self.path);
        self.report(result);
    }

    fn report(&self, result: std::io::Result<()>) {
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove job directory");
            }
        }
    }
}

impl Drop for JobDirectory {
    fn drop(&mut self) {
        self.remove_now();
    }
}
