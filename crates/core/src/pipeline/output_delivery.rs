use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::lifecycle::resource_guard::ResourceGuard;
use crate::lifecycle::scratch::ScratchDir;

/// Annotated video ready for download. Consuming it hands out the bytes
/// and deletes the backing storage; dropping it unconsumed deletes it too.
pub struct DeliverableOutput {
    mime_type: &'static str,
    file_name: String,
    path: PathBuf,
    storage: ResourceGuard<ScratchDir>,
}

impl DeliverableOutput {
    pub(crate) fn new(
        mime_type: &'static str,
        file_name: &str,
        path: PathBuf,
        storage: ResourceGuard<ScratchDir>,
    ) -> Self {
        Self {
            mime_type,
            file_name: file_name.to_string(),
            path,
            storage,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Suggested download name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Location of the encoded file until the output is consumed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the whole file and deletes it.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Streams the file into `out` and deletes it. Returns bytes copied.
    pub fn write_to(mut self, mut out: impl Write) -> io::Result<u64> {
        let copied = io::copy(&mut File::open(&self.path)?, &mut out)?;
        out.flush()?;
        self.storage
            .release()
            .map_err(|e| io::Error::other(e.to_string()))?;
        log::debug!("Delivered {} ({copied} bytes)", self.file_name);
        Ok(copied)
    }
}

impl fmt::Debug for DeliverableOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliverableOutput")
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("path", &self.path)
            .finish()
    }
}
