//! Filesystem abstraction (C1). A thin trait over read/write/stat/list so
//! the rest of the pipeline — and its tests — never touch `std::fs`
//! directly. Mirrors the delegate-wrapping shape of the teacher's
//! `CapturingFileSystem`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The real filesystem, delegating straight to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        // `canonicalize` requires the path to exist; fall back to a
        // lexical normalization for not-yet-created output paths.
        path.canonicalize().or_else(|_| Ok(lexical_normalize(path)))
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// An in-memory filesystem used by tests and by `transpile({kind: source, ..})`
/// requests, which have no real files to read. Grounded on the teacher's
/// `CapturingFileSystem`: writes land in a map instead of on disk.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), contents.into());
        self
    }

    pub fn snapshot(&self) -> HashMap<PathBuf, String> {
        self.files.lock().unwrap().clone()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, _path: &Path) -> bool {
        false
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn ensure_dir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(lexical_normalize(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fs_round_trips_writes() {
        let fs = MemoryFileSystem::new();
        fs.write_file(Path::new("/proj/a.c"), "int main() {}").unwrap();
        assert_eq!(fs.read_file(Path::new("/proj/a.c")).unwrap(), "int main() {}");
        assert!(fs.exists(Path::new("/proj/a.c")));
        assert!(!fs.exists(Path::new("/proj/b.c")));
    }

    #[test]
    fn with_file_seeds_initial_contents() {
        let fs = MemoryFileSystem::new().with_file("/proj/a.cnx", "void main() {}");
        assert_eq!(fs.read_file(Path::new("/proj/a.cnx")).unwrap(), "void main() {}");
    }
}
