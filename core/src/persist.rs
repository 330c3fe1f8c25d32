use crate::error::{Result, SearchError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 3;

/// Length and CRC32 of a data file, recorded in `meta.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub len: u64,
    pub crc32: u32,
}

/// `meta.json` is written last; its presence marks a complete index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: u32,
    pub num_tokens: u64,
    pub analyzer: String,
    pub created_at: String,
    pub dictionary: FileStamp,
    pub docs: FileStamp,
    pub postings: FileStamp,
    pub texts: FileStamp,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        // Dropping trailing separators keeps sibling paths outside the index dir.
        Self { root: root.as_ref().components().collect() }
    }
    pub fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn texts(&self) -> PathBuf { self.root.join("texts.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// Where a build writes before it is committed.
    pub fn staging(&self) -> IndexPaths { IndexPaths { root: self.sibling(".staging") } }
    pub fn lock(&self) -> PathBuf { self.sibling(".lock") }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.root.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Writer that tracks length and CRC32 of everything written through it.
pub struct StampedWriter<W: Write> {
    inner: W,
    len: u64,
    hasher: crc32fast::Hasher,
}

impl<W: Write> StampedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, len: 0, hasher: crc32fast::Hasher::new() }
    }

    pub fn position(&self) -> u64 { self.len }

    pub fn finish(mut self) -> io::Result<(W, FileStamp)> {
        self.inner.flush()?;
        let stamp = FileStamp { len: self.len, crc32: self.hasher.finalize() };
        Ok((self.inner, stamp))
    }
}

impl<W: Write> Write for StampedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<FileStamp> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(FileStamp { len: bytes.len() as u64, crc32: crc32fast::hash(bytes) })
}

pub fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<FileStamp> {
    let bytes = bincode::serialize(value)?;
    write_file(path, &bytes)
}

/// Reads a whole file and checks it against its stamp before decoding.
pub fn load_bincode<T: DeserializeOwned>(path: &Path, expected: &FileStamp) -> Result<T> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    check_stamp(path, &buf, expected)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn check_stamp(path: &Path, bytes: &[u8], expected: &FileStamp) -> Result<()> {
    if bytes.len() as u64 != expected.len {
        return Err(SearchError::Corrupt(format!(
            "{}: expected {} bytes, found {}",
            path.display(),
            expected.len,
            bytes.len()
        )));
    }
    if crc32fast::hash(bytes) != expected.crc32 {
        return Err(SearchError::Corrupt(format!("{}: checksum mismatch", path.display())));
    }
    Ok(())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    write_file(&paths.meta(), json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Replaces `target` with the fully written `staging` directory.
///
/// Any existing index at `target` is deleted first.
pub fn commit_staging(staging: &IndexPaths, target: &IndexPaths) -> Result<()> {
    if target.root.exists() {
        tracing::info!(path = %target.root.display(), "removing previous index");
        fs::remove_dir_all(&target.root)?;
    }
    fs::rename(&staging.root, &target.root)?;
    Ok(())
}

/// Exclusive lock on a build destination, released on drop.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    pub fn acquire(paths: &IndexPaths) -> Result<Self> {
        let path = paths.lock();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                writeln!(f, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(SearchError::BuildLocked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release build lock");
        }
    }
}
