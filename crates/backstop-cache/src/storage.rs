use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// The persistent-tier collaborator: plain keyed byte storage.
///
/// The store serializes entries itself; implementations only move bytes.
/// `read` of an absent key is `Ok(None)`, not an error.
pub trait CacheStorage: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
    fn delete(&self, key: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Filesystem-backed storage: one file per key inside a directory.
///
/// Keys are hex digests (see [`crate::cache_key`]), so they are used as
/// file names without escaping.
pub struct DirStorage {
    dir: PathBuf,
}

impl DirStorage {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CacheStorage for DirStorage {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(self.path_for(key), bytes)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn clear(&self) -> io::Result<()> {
        std::fs::remove_dir_all(&self.dir)?;
        std::fs::create_dir_all(&self.dir)
    }
}

/// In-process storage, mostly for tests and cache-less configurations.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl CacheStorage for MemoryStorage {
    fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
