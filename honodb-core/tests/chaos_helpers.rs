// chaos_helpers.rs
// Utility functions for chaos/corruption testing

#![allow(dead_code)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use honodb_core::{Catalog, DatabaseConfig, FileBackend};
use tempfile::TempDir;

/// Data directory with one database and one empty collection
pub fn setup_collection(
    db: &str,
    collection: &str,
    config: DatabaseConfig,
) -> (TempDir, Catalog<FileBackend>) {
    let dir = TempDir::new().unwrap();
    let catalog = Catalog::open_dir(dir.path(), config).unwrap();
    catalog.create_database(db).unwrap();
    catalog
        .open_database(db)
        .unwrap()
        .create_collection(collection)
        .unwrap();
    (dir, catalog)
}

/// Path of chunk `seq` of `db.collection` inside `dir`
pub fn chunk_path(dir: &Path, db: &str, collection: &str, seq: u32) -> PathBuf {
    dir.join(format!("{}_{}_{}.json", db, collection, seq))
}

/// Overwrite bytes at specific offset in a file
pub fn corrupt_bytes_at(path: &Path, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Truncate file to specified length
pub fn truncate_file(path: &Path, len: u64) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()
}

/// Append raw bytes to end of file (simulating a torn append)
pub fn append_garbage(path: &Path, garbage: &[u8]) -> std::io::Result<u64> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    let offset = file.seek(SeekFrom::End(0))?;
    file.write_all(garbage)?;
    file.sync_all()?;
    Ok(offset)
}

/// Byte offset of line `n` (0-based) in a chunk file
pub fn line_offset(path: &Path, n: usize) -> std::io::Result<u64> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if n == 0 {
        return Ok(0);
    }
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(n - 1)
        .map(|(i, _)| i as u64 + 1)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no such line"))
}

/// Leave a `.tmp` file behind, as an interrupted atomic rewrite would
pub fn write_leftover_temp(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    let temp = PathBuf::from(name);
    std::fs::write(&temp, bytes)?;
    Ok(temp)
}

/// Get file length
pub fn file_len(path: &Path) -> std::io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}
