#![allow(dead_code)]

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use auditfs_core::{FileSystem, FsError, FsResult, OsFs, PathStat, BYTES_PER_MB};

/// Entry size every in-memory directory reports for itself.
pub const DIR_SIZE: u64 = 4096;

#[derive(Debug, Clone)]
enum Entry {
    Dir { readable: bool },
    File { size: u64, readable: bool },
    Link { target: PathBuf },
}

/// In-memory tree keeping insertion order as listing order, with call counters.
#[derive(Debug, Default)]
pub struct MemFs {
    entries: Vec<(PathBuf, Entry)>,
    stat_calls: AtomicUsize,
    read_dir_calls: AtomicUsize,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(self, path: &str) -> Self {
        self.with(path, Entry::Dir { readable: true })
    }

    pub fn unreadable_dir(self, path: &str) -> Self {
        self.with(path, Entry::Dir { readable: false })
    }

    pub fn file(self, path: &str, size: u64) -> Self {
        self.with(path, Entry::File { size, readable: true })
    }

    pub fn unreadable_file(self, path: &str, size: u64) -> Self {
        self.with(path, Entry::File { size, readable: false })
    }

    pub fn link(self, path: &str, target: &str) -> Self {
        self.with(
            path,
            Entry::Link {
                target: PathBuf::from(target),
            },
        )
    }

    fn with(mut self, path: &str, entry: Entry) -> Self {
        self.entries.push((PathBuf::from(path), entry));
        self
    }

    pub fn into_arc(self) -> Arc<MemFs> {
        Arc::new(self)
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn read_dir_calls(&self) -> usize {
        self.read_dir_calls.load(Ordering::SeqCst)
    }

    fn get(&self, path: &Path) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, e)| e)
    }

    /// Rewrite `path` so none of its parent components is a link or `..`.
    fn unlink_parents(&self, path: &Path) -> PathBuf {
        let components: Vec<_> = path.components().collect();
        let mut out = PathBuf::new();
        for (i, component) in components.iter().enumerate() {
            if *component == Component::ParentDir {
                out.pop();
                continue;
            }
            out.push(component);
            if i + 1 < components.len() {
                if let Some((real, _)) = self.follow(&out) {
                    out = real;
                }
            }
        }
        out
    }

    fn entry(&self, path: &Path) -> Option<&Entry> {
        self.get(&self.unlink_parents(path))
    }

    /// Follow links to a non-link entry; `None` when missing or dangling.
    fn resolve(&self, path: &Path) -> Option<(PathBuf, &Entry)> {
        self.follow(&self.unlink_parents(path))
    }

    /// True when an ancestor of `path` is an unreadable directory, which
    /// makes the path itself impossible to look up.
    fn behind_unreadable(&self, path: &Path) -> bool {
        self.unlink_parents(path).ancestors().skip(1).any(|ancestor| {
            matches!(self.get(ancestor), Some(Entry::Dir { readable: false }))
        })
    }

    fn follow(&self, path: &Path) -> Option<(PathBuf, &Entry)> {
        let mut current = path.to_path_buf();
        for _ in 0..8 {
            match self.get(&current)? {
                Entry::Link { target } => current = self.unlink_parents(target),
                entry => return Some((current, entry)),
            }
        }
        None
    }
}

impl FileSystem for MemFs {
    fn stat(&self, path: &Path) -> FsResult<PathStat> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.behind_unreadable(path) {
            return Ok(PathStat::missing(path));
        }
        let Some(entry) = self.entry(path) else {
            return Ok(PathStat::missing(path));
        };
        let is_symlink = matches!(entry, Entry::Link { .. });
        let stat = match self.resolve(path) {
            Some((_, Entry::Dir { readable })) => PathStat {
                path: path.to_path_buf(),
                exists: true,
                is_directory: true,
                is_symlink,
                is_readable: *readable,
                size_bytes: DIR_SIZE,
            },
            Some((_, Entry::File { size, readable })) => PathStat {
                path: path.to_path_buf(),
                exists: true,
                is_directory: false,
                is_symlink,
                is_readable: *readable,
                size_bytes: *size,
            },
            _ => {
                let Entry::Link { target } = entry else {
                    return Ok(PathStat::missing(path));
                };
                PathStat {
                    path: path.to_path_buf(),
                    exists: true,
                    is_directory: false,
                    is_symlink: true,
                    is_readable: true,
                    size_bytes: target.as_os_str().len() as u64,
                }
            }
        };
        Ok(stat)
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        match self.entry(path)? {
            Entry::Link { target } => Some(target.clone()),
            _ => None,
        }
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        self.read_dir_calls.fetch_add(1, Ordering::SeqCst);
        if self.behind_unreadable(path) {
            return Err(FsError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        let not_found = || FsError::NotFound {
            path: path.to_path_buf(),
        };
        match self.resolve(path) {
            Some((real, Entry::Dir { readable: true })) => Ok(self
                .entries
                .iter()
                .filter(|(p, _)| p.parent() == Some(real.as_path()))
                .filter_map(|(p, _)| p.file_name().map(|name| path.join(name)))
                .collect()),
            Some((_, Entry::Dir { readable: false })) => Err(FsError::PermissionDenied {
                path: path.to_path_buf(),
            }),
            _ => Err(not_found()),
        }
    }
}

/// `std::fs` backend that counts `stat` calls and uses the generic walk.
#[derive(Debug, Default)]
pub struct CountingOsFs {
    pub stat_calls: AtomicUsize,
}

impl CountingOsFs {
    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }
}

impl FileSystem for CountingOsFs {
    fn stat(&self, path: &Path) -> FsResult<PathStat> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        OsFs.stat(path)
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        OsFs.read_link(path)
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        OsFs.read_dir(path)
    }
}

/// A small storefront install:
///
/// ```text
/// /shop/app/code.php       1000
/// /shop/app/etc/env.php     500
/// /shop/index.php          2000
/// /shop/var/              unreadable, holds cache.bin
/// /shop/secret.key          300, unreadable
/// ```
pub fn shop_fs() -> MemFs {
    MemFs::new()
        .dir("/shop")
        .dir("/shop/app")
        .file("/shop/app/code.php", 1000)
        .dir("/shop/app/etc")
        .file("/shop/app/etc/env.php", 500)
        .file("/shop/index.php", 2000)
        .unreadable_dir("/shop/var")
        .file("/shop/var/cache.bin", 9999)
        .unreadable_file("/shop/secret.key", 300)
}

pub fn mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub fn names(nodes: &[auditfs_core::FilesystemNode]) -> Vec<String> {
    nodes.iter().map(|n| n.base_name()).collect()
}
