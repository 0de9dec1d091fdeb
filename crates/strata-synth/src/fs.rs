//! Filesystem access used by the synthesizer

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// The primitives generation needs. Implementations must be usable from
/// several threads at once.
pub trait FileSystem: Send + Sync {
    /// Create or truncate `path` with `contents`.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Create `path` only if it does not exist, atomically. Returns whether
    /// the file was created.
    fn write_new(&self, path: &Path, contents: &str) -> io::Result<bool>;

    /// Contents of `path`, or `None` when it does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn write_new(&self, path: &Path, contents: &str) -> io::Result<bool> {
        create_new_with(path, |file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

/// Create `path` exclusively and hand it to `fill`. A file that `fill` fails
/// on is removed again, so no partial file is left behind.
fn create_new_with(path: &Path, fill: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            tracing::warn!("Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(e);
    }
    Ok(true)
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).write(path, contents)
    }

    fn write_new(&self, path: &Path, contents: &str) -> io::Result<bool> {
        (**self).write_new(path, contents)
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        (**self).read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }
}
