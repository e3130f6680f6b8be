//! Filesystem access for job directories.
//!
//! Status is derived from directory contents on every call, so all reads go
//! through [`JobFilesystem`]. [`LocalFilesystem`] is the real disk;
//! [`MemoryFilesystem`] keeps a fake tree in memory with controllable
//! timestamps.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub trait JobFilesystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Names of the regular files directly inside `dir`.
    fn file_names(&self, dir: &Path) -> io::Result<Vec<String>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    /// When the file first appeared.
    fn created(&self, path: &Path) -> io::Result<SystemTime>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn append(&self, path: &Path, contents: &str) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl JobFilesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn created(&self, path: &Path) -> io::Result<SystemTime> {
        let metadata = fs::metadata(path)?;
        metadata.created().or_else(|_| metadata.modified())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn append(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(contents.as_bytes())
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    Directory,
    File { contents: String, created: SystemTime },
}

#[derive(Debug)]
pub struct MemoryFilesystem {
    entries: RefCell<BTreeMap<PathBuf, MemoryEntry>>,
    clock: Cell<SystemTime>,
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            clock: Cell::new(SystemTime::UNIX_EPOCH),
        }
    }

    /// Creation time stamped on files written from now on.
    pub fn set_clock(&self, now: SystemTime) {
        self.clock.set(now);
    }

    pub fn set_created(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        match self.entries.borrow_mut().get_mut(path) {
            Some(MemoryEntry::File { created, .. }) => {
                *created = time;
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn parent_is_dir(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.is_dir(parent),
            _ => true,
        }
    }
}

impl JobFilesystem for MemoryFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries.borrow().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(
            self.entries.borrow().get(path),
            Some(MemoryEntry::Directory)
        )
    }

    fn file_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        if !self.is_dir(dir) {
            return Err(not_found(dir));
        }
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|(path, entry)| {
                matches!(entry, MemoryEntry::File { .. }) && path.parent() == Some(dir)
            })
            .filter_map(|(path, _)| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.entries.borrow().get(path) {
            Some(MemoryEntry::File { contents, .. }) => Ok(contents.clone()),
            _ => Err(not_found(path)),
        }
    }

    fn created(&self, path: &Path) -> io::Result<SystemTime> {
        match self.entries.borrow().get(path) {
            Some(MemoryEntry::File { created, .. }) => Ok(*created),
            _ => Err(not_found(path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.entries.borrow_mut();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            match entries.get(ancestor) {
                Some(MemoryEntry::File { .. }) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("'{}' is a file", ancestor.display()),
                    ));
                }
                Some(MemoryEntry::Directory) => {}
                None => {
                    entries.insert(ancestor.to_path_buf(), MemoryEntry::Directory);
                }
            }
        }
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if !self.parent_is_dir(path) {
            return Err(not_found(path));
        }
        let now = self.clock.get();
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(path) {
            Some(MemoryEntry::File { contents: existing, .. }) => {
                *existing = contents.to_owned();
            }
            Some(MemoryEntry::Directory) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' is a directory", path.display()),
                ));
            }
            None => {
                entries.insert(
                    path.to_path_buf(),
                    MemoryEntry::File {
                        contents: contents.to_owned(),
                        created: now,
                    },
                );
            }
        }
        Ok(())
    }

    fn append(&self, path: &Path, contents: &str) -> io::Result<()> {
        let existing = match self.read_to_string(path) {
            Ok(existing) => existing,
            Err(error) if error.kind() == io::ErrorKind::NotFound => String::new(),
            Err(error) => return Err(error),
        };
        self.write(path, &(existing + contents))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("'{}' does not exist", path.display()),
    )
}
