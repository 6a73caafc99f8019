// storage/file_storage.rs
//! File-based storage backend
//!
//! Every object is a regular file directly inside the data directory.
//!
//! ```text
//! data/
//!   metadata.json
//!   school_students_1.json
//!   school_students_2.json
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::storage::traits::{ChunkBackend, TEMP_SUFFIX};

/// File-based storage backend (production)
///
/// # Examples
///
/// ```no_run
/// use honodb_core::storage::FileBackend;
///
/// let backend = FileBackend::open("./data", true)?;
/// # Ok::<(), honodb_core::HonoError>(())
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    sync: bool,
}

impl FileBackend {
    /// Open a data directory, creating it if needed
    ///
    /// With `sync` set, appends are followed by `sync_data` and atomic
    /// replacements also fsync the directory.
    pub fn open<P: AsRef<Path>>(root: P, sync: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FileBackend { root, sync })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> Result<()> {
        // fsync on a directory persists its entries (the rename)
        let dir = File::open(&self.root)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> Result<()> {
        Ok(())
    }
}

impl ChunkBackend for FileBackend {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path(name).is_file())
    }

    fn len(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.path(name))?.len())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(name))?)
    }

    fn append(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path(name))?;

        let pre_write_len = file.seek(SeekFrom::End(0))?;
        let written = file
            .write_all(bytes)
            .and_then(|_| if self.sync { file.sync_data() } else { Ok(()) });

        if let Err(e) = written {
            // Rollback: drop the partial record
            if let Err(trunc_err) = file.set_len(pre_write_len) {
                warn!(file = name, error = %trunc_err, "failed to roll back partial append");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let target = self.path(name);
        let temp_path = self.path(&format!("{}{}", name, TEMP_SUFFIX));

        let written = (|| -> io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, &target)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        if self.sync {
            self.sync_directory()?;
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
