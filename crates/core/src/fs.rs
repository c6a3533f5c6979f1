//! Host filesystem primitives the tree model is built on.
//!
//! Everything above this module talks to the disk through [`FileSystem`], so
//! tests can swap in an in-memory tree and count calls.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FsError, FsResult};

/// Point-in-time status of one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStat {
    pub path: PathBuf,
    /// False when the path is missing or its lookup was refused.
    pub exists: bool,
    /// Follows symlinks.
    pub is_directory: bool,
    pub is_symlink: bool,
    pub is_readable: bool,
    /// Follows symlinks; a dangling link reports its own length.
    pub size_bytes: u64,
}

impl PathStat {
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            is_directory: false,
            is_symlink: false,
            is_readable: false,
            size_bytes: 0,
        }
    }
}

pub trait FileSystem: Send + Sync {
    /// Status of `path`. Missing and permission-denied lookups come back as
    /// [`PathStat::missing`]; only unexpected I/O failures are errors.
    fn stat(&self, path: &Path) -> FsResult<PathStat>;

    /// Absolute target of a symlink, `None` if `path` is not one.
    fn read_link(&self, path: &Path) -> Option<PathBuf>;

    /// Full paths of the direct entries of `path`, in the order the OS returns them.
    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>>;

    /// Visit the status of every descendant of `root` (not `root` itself).
    ///
    /// Directories that vanish or refuse listing are skipped. A directory
    /// whose physical location (links and `..` resolved) was already visited
    /// is not entered again.
    fn walk(
        &self,
        root: &Path,
        follow_links: bool,
        visit: &mut dyn FnMut(&PathStat),
    ) -> FsResult<()> {
        let root_real = real_path(self, root);
        let mut visited = HashSet::new();
        visited.insert(root_real.clone());
        let mut stack = vec![(root.to_path_buf(), root_real)];

        while let Some((dir, dir_real)) = stack.pop() {
            let entries = match self.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(error = %e, "skipping unlistable directory");
                    continue;
                }
            };
            for path in entries {
                let stat = self.stat(&path)?;
                visit(&stat);
                if !stat.is_directory || (stat.is_symlink && !follow_links) {
                    continue;
                }
                let real = match (stat.is_symlink, path.file_name()) {
                    (false, Some(name)) => dir_real.join(name),
                    _ => real_path(self, &path),
                };
                if visited.insert(real.clone()) {
                    stack.push((path, real));
                }
            }
        }
        Ok(())
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn stat(&self, path: &Path) -> FsResult<PathStat> {
        let link_meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if is_absent(&e) => return Ok(PathStat::missing(path)),
            Err(e) => return Err(FsError::from_io(path, e)),
        };
        let is_symlink = link_meta.file_type().is_symlink();
        let meta = if is_symlink {
            match fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    // dangling or looping link: describe the link itself
                    debug!(path = %path.display(), error = %e, "unresolvable symlink");
                    link_meta
                }
            }
        } else {
            link_meta
        };

        let file_type = meta.file_type();
        let is_readable = if file_type.is_dir() {
            fs::read_dir(path).is_ok()
        } else if file_type.is_file() {
            fs::File::open(path).is_ok()
        } else {
            true
        };

        Ok(PathStat {
            path: path.to_path_buf(),
            exists: true,
            is_directory: file_type.is_dir(),
            is_symlink,
            is_readable,
            size_bytes: meta.len(),
        })
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        let target = fs::read_link(path).ok()?;
        if target.is_absolute() {
            return Some(target);
        }
        Some(match path.parent() {
            Some(parent) => parent.join(target),
            None => target,
        })
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        fs::read_dir(path)
            .map_err(|e| FsError::from_io(path, e))?
            .map(|entry| {
                entry
                    .map(|e| e.path())
                    .map_err(|e| FsError::from_io(path, e))
            })
            .collect()
    }

    fn walk(
        &self,
        root: &Path,
        follow_links: bool,
        visit: &mut dyn FnMut(&PathStat),
    ) -> FsResult<()> {
        for entry in WalkDir::new(root).follow_links(follow_links).min_depth(1) {
            let err = match entry {
                Ok(entry) => {
                    visit(&self.stat(entry.path())?);
                    continue;
                }
                Err(err) => err,
            };
            let Some(path) = err.path().map(Path::to_path_buf) else {
                continue;
            };
            if err.loop_ancestor().is_some() {
                // the link itself is an entry; only its contents are skipped
                debug!(path = %path.display(), "symlink loop, not descending");
                visit(&self.stat(&path)?);
                continue;
            }
            let is_link = fs::symlink_metadata(&path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_link {
                // a link walkdir cannot resolve (dangling, looping) still counts
                // with its own lstat; one that resolves was already yielded
                if fs::metadata(&path).is_err() {
                    visit(&self.stat(&path)?);
                } else {
                    debug!(path = %path.display(), "skipping unlistable linked directory");
                }
                continue;
            }
            match err.into_io_error() {
                Some(io_err) if !is_absent(&io_err) => {
                    return Err(FsError::from_io(&path, io_err));
                }
                _ => debug!(path = %path.display(), "skipping inaccessible entry"),
            }
        }
        Ok(())
    }
}

const MAX_LINK_HOPS: usize = 40;

/// Physical location of `path`: `..` and `.` applied after every link
/// component is replaced by its target, like `canonicalize` but through `fs`.
fn real_path<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> PathBuf {
    let mut hops = 0;
    resolve_components(fs, path, &mut hops)
}

fn resolve_components<F: FileSystem + ?Sized>(fs: &F, path: &Path, hops: &mut usize) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => {
                out.push(name);
                if *hops >= MAX_LINK_HOPS {
                    continue;
                }
                if let Some(target) = fs.read_link(&out) {
                    *hops += 1;
                    out = resolve_components(fs, &target, hops);
                }
            }
            Component::RootDir | Component::Prefix(_) => out.push(component),
        }
    }
    out
}

fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}
