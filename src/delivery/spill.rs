use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory of files whose upload failed. A file being here is the whole of its
/// "pending" state.
#[derive(Debug, Clone)]
pub struct RetrySpill {
    dir: PathBuf,
}

impl RetrySpill {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `file` in under its own name. The original stays where it is.
    pub fn spill(&self, file: &Path) -> Result<PathBuf> {
        let name = file
            .file_name()
            .ok_or_else(|| anyhow!("No file name in {}", file.display()))?;
        let dest = self.dir.join(name);
        fs::copy(file, &dest).with_context(|| format!("Failed to copy {} to retry queue", file.display()))?;
        Ok(dest)
    }

    /// Files currently waiting, in name order. Taken once; later additions are not seen.
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).with_context(|| format!("Failed to read {}", self.dir.display()))? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// One pass over the current snapshot. Files for which `upload` succeeds are
    /// deleted, the rest stay for the next pass. Returns how many were delivered.
    pub fn drain<F>(&self, mut upload: F) -> Result<usize>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        let mut delivered = 0;
        for path in self.pending()? {
            tracing::info!("Retrying offline file: {}", path.display());
            match upload(&path) {
                Ok(()) => {
                    fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
                    delivered += 1;
                }
                Err(e) => tracing::warn!("Retry failed for {}: {:#}", path.display(), e),
            }
        }
        Ok(delivered)
    }
}
