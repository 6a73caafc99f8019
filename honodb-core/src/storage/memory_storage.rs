// storage/memory_storage.rs
//! Pure in-memory storage backend for fast testing
//!
//! ```text
//! MemoryBackend (ChunkBackend implementation)
//!      ↓
//! HashMap<String, Vec<u8>> (object name -> bytes)
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::traits::ChunkBackend;

/// In-memory storage backend (testing)
///
/// No persistence: data is lost when dropped. `write_atomic` swaps the
/// buffer under the lock, which is as atomic as a rename.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    failing_replaces: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under a name, bypassing the chunk layer
    pub fn put_raw(&self, name: &str, bytes: &[u8]) {
        self.objects.write().insert(name.to_string(), bytes.to_vec());
    }

    /// Make the next `count` calls to `write_atomic` fail with an I/O error
    /// and leave the object untouched
    pub fn fail_next_replaces(&self, count: usize) {
        self.failing_replaces.store(count, Ordering::SeqCst);
    }
}

impl ChunkBackend for MemoryBackend {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.objects.read().keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(name))
    }

    fn len(&self, name: &str) -> Result<u64> {
        self.objects
            .read()
            .get(name)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such object: {}", name)).into()
            })
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.objects.read().get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such object: {}", name)).into()
        })
    }

    fn append(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.objects
            .write()
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let injected = self
            .failing_replaces
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure").into());
        }
        self.objects.write().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.objects.write().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_roundtrip() {
        let backend = MemoryBackend::new();
        backend.append("c.json", b"a\n").unwrap();
        backend.append("c.json", b"b\n").unwrap();
        assert_eq!(backend.read("c.json").unwrap(), b"a\nb\n");
        assert_eq!(backend.len("c.json").unwrap(), 4);

        backend.write_atomic("c.json", b"z\n").unwrap();
        assert_eq!(backend.read("c.json").unwrap(), b"z\n");

        backend.remove("c.json").unwrap();
        assert!(!backend.exists("c.json").unwrap());
        assert!(backend.read("c.json").is_err());
    }

    #[test]
    fn test_injected_replace_failure() {
        let backend = MemoryBackend::new();
        backend.put_raw("c.json", b"a\n");
        backend.fail_next_replaces(1);

        assert!(backend.write_atomic("c.json", b"b\n").is_err());
        assert_eq!(backend.read("c.json").unwrap(), b"a\n");
        backend.write_atomic("c.json", b"b\n").unwrap();
        assert_eq!(backend.read("c.json").unwrap(), b"b\n");
    }
}
