use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};

use super::resource_guard::Release;

/// Temp file holding an uploaded byte stream so it can be opened by path.
///
/// The file is deleted on release.
pub struct ScratchFile {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl ScratchFile {
    /// Copies `upload` into a fresh temp file ending in `suffix`.
    pub fn from_reader(upload: &mut dyn Read, suffix: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(suffix)
            .tempfile()?;
        let written = io::copy(upload, &mut file)?;
        file.flush()?;
        log::debug!("Wrote {written} upload bytes to {}", file.path().display());

        let temp = file.into_temp_path();
        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Release for ScratchFile {
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(temp) = self.temp.take() {
            temp.close()?;
        }
        Ok(())
    }
}

/// Temp directory for encoder output. Removed with everything in it on
/// release.
pub struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    pub fn new(prefix: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }
}

impl Release for ScratchDir {
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}
