use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Value read back from storage that was never written.
pub const ERASED_BYTE: u8 = 0xFF;

/// Byte addressable non-volatile storage.
pub trait NvStorage {
    fn read_bytes(&self, offset: usize, size: usize) -> io::Result<Vec<u8>>;

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered writes to the medium.
    fn commit(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Whether writes stay pending until [`NvStorage::commit`] is called.
    fn buffers_writes(&self) -> bool {
        false
    }
}

/// Storage held in memory, written through immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }
}

impl NvStorage for MemoryStorage {
    fn read_bytes(&self, offset: usize, size: usize) -> io::Result<Vec<u8>> {
        Ok(read_window(&self.bytes, offset, size))
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()> {
        write_window(&mut self.bytes, offset, bytes);
        Ok(())
    }
}

/// Flash emulation backed by a single file.
///
/// Writes go to an in-memory image and only reach the file on [`NvStorage::commit`].
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    image: Vec<u8>,
    dirty: bool,
}

impl FileStorage {
    /// Open the image at `path`; a missing file reads as erased storage.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let image = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No storage image at {}, starting erased", path.display());
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            image,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl NvStorage for FileStorage {
    fn read_bytes(&self, offset: usize, size: usize) -> io::Result<Vec<u8>> {
        Ok(read_window(&self.image, offset, size))
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()> {
        write_window(&mut self.image, offset, bytes);
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        fs::write(&self.path, &self.image)?;
        self.dirty = false;
        info!("Storage committed to {}", self.path.display());
        Ok(())
    }

    fn buffers_writes(&self) -> bool {
        true
    }
}

fn read_window(image: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut out = vec![ERASED_BYTE; size];
    if offset < image.len() {
        let available = (image.len() - offset).min(size);
        out[..available].copy_from_slice(&image[offset..offset + available]);
    }
    out
}

fn write_window(image: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    let end = offset + bytes.len();
    if image.len() < end {
        image.resize(end, ERASED_BYTE);
    }
    image[offset..end].copy_from_slice(bytes);
}
