use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FsResult;
use crate::fs::{FileSystem, PathStat};

pub const BYTES_PER_MB: f64 = 1_048_576.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
    /// Missing or inaccessible path.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: NodeKind,
    pub is_link: bool,
    pub is_readable: bool,
}

impl From<&PathStat> for Classification {
    fn from(stat: &PathStat) -> Self {
        let kind = if !stat.exists {
            NodeKind::Unknown
        } else if stat.is_directory {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        Self {
            kind,
            is_link: stat.is_symlink,
            is_readable: stat.is_readable,
        }
    }
}

/// One path on disk with lazily derived metadata.
///
/// Status is fetched once on first access and kept for the life of the node.
/// Aggregate size and file count are computed on demand under a per-node lock,
/// so concurrent callers never walk the same subtree twice.
pub struct FilesystemNode {
    full_path: PathBuf,
    fs: Arc<dyn FileSystem>,
    stat: OnceLock<PathStat>,
    link_target: OnceLock<Option<PathBuf>>,
    total_size: Mutex<Option<f64>>,
    file_count: Mutex<Option<u64>>,
    children: Option<Vec<FilesystemNode>>,
}

impl FilesystemNode {
    pub fn new(full_path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            full_path: full_path.into(),
            fs,
            stat: OnceLock::new(),
            link_target: OnceLock::new(),
            total_size: Mutex::new(None),
            file_count: Mutex::new(None),
            children: None,
        }
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Last path segment, or the whole path for roots like `/`.
    pub fn base_name(&self) -> String {
        match self.full_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.full_path.to_string_lossy().into_owned(),
        }
    }

    fn stat(&self) -> FsResult<&PathStat> {
        if let Some(stat) = self.stat.get() {
            return Ok(stat);
        }
        let stat = self.fs.stat(&self.full_path)?;
        Ok(self.stat.get_or_init(|| stat))
    }

    pub fn classify(&self) -> FsResult<Classification> {
        self.stat().map(Classification::from)
    }

    pub fn kind(&self) -> FsResult<NodeKind> {
        Ok(self.classify()?.kind)
    }

    pub fn is_directory(&self) -> FsResult<bool> {
        Ok(self.kind()? == NodeKind::Directory)
    }

    pub fn is_link(&self) -> FsResult<bool> {
        Ok(self.stat()?.is_symlink)
    }

    pub fn is_readable(&self) -> FsResult<bool> {
        Ok(self.stat()?.is_readable)
    }

    /// Absolute target of the link, resolved on first call.
    pub fn link_target(&self) -> FsResult<Option<&Path>> {
        if !self.is_link()? {
            return Ok(None);
        }
        let target = self
            .link_target
            .get_or_init(|| self.fs.read_link(&self.full_path));
        Ok(target.as_deref())
    }

    /// Aggregate size in megabytes.
    ///
    /// Files report their own size. Directories add every readable entry of
    /// the whole subtree, following symlinks, to their own entry size; the
    /// walk ignores any listing depth. An unreadable node yields `None`, and
    /// that result is deliberately not cached.
    pub fn total_size_mb(&self) -> FsResult<Option<f64>> {
        let mut cached = self.total_size.lock();
        if let Some(size) = *cached {
            return Ok(Some(size));
        }

        let stat = self.stat()?;
        if !stat.is_readable {
            return Ok(None);
        }

        let mut bytes = stat.size_bytes;
        if stat.is_directory {
            debug!(path = %self.full_path.display(), "walking subtree for size");
            self.fs.walk(&self.full_path, true, &mut |entry| {
                if entry.is_readable {
                    bytes = bytes.saturating_add(entry.size_bytes);
                }
            })?;
        }

        let size = bytes as f64 / BYTES_PER_MB;
        *cached = Some(size);
        Ok(Some(size))
    }

    /// Size computed by an earlier [`total_size_mb`](Self::total_size_mb) call, if any.
    pub fn cached_total_size_mb(&self) -> Option<f64> {
        *self.total_size.lock()
    }

    /// Number of non-directory entries below a directory, symlinks counted
    /// as entries rather than followed. `None` for anything but a directory.
    ///
    /// Walks the whole subtree, so nothing in the listing path calls it.
    pub fn file_count(&self) -> FsResult<Option<u64>> {
        if !self.is_directory()? {
            return Ok(None);
        }
        let mut cached = self.file_count.lock();
        if let Some(count) = *cached {
            return Ok(Some(count));
        }

        let mut count = 0u64;
        self.fs.walk(&self.full_path, false, &mut |entry| {
            if !entry.is_directory || entry.is_symlink {
                count += 1;
            }
        })?;
        *cached = Some(count);
        Ok(Some(count))
    }

    /// Populate the direct children of a directory in OS listing order.
    ///
    /// No-op for non-directories and for nodes that are already expanded.
    /// A listing failure leaves the node unexpanded and is returned.
    pub fn expand_children(&mut self) -> FsResult<()> {
        if self.children.is_some() || !self.is_directory()? {
            return Ok(());
        }
        let entries = self.fs.read_dir(&self.full_path)?;
        debug!(
            path = %self.full_path.display(),
            entries = entries.len(),
            "expanded directory"
        );
        let children = entries
            .into_iter()
            .map(|path| FilesystemNode::new(path, Arc::clone(&self.fs)))
            .collect();
        self.children = Some(children);
        Ok(())
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// `None` until expanded.
    pub fn children(&self) -> Option<&[FilesystemNode]> {
        self.children.as_deref()
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<FilesystemNode>> {
        self.children.as_mut()
    }

    pub fn take_children(&mut self) -> Option<Vec<FilesystemNode>> {
        self.children.take()
    }

    pub fn into_children(self) -> Option<Vec<FilesystemNode>> {
        self.children
    }

    pub(crate) fn set_children(&mut self, children: Vec<FilesystemNode>) {
        self.children = Some(children);
    }
}

impl fmt::Debug for FilesystemNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemNode")
            .field("full_path", &self.full_path)
            .field("stat", &self.stat.get())
            .field("total_size", &self.cached_total_size_mb())
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFs;

    #[test]
    fn base_name_is_last_segment() {
        let node = FilesystemNode::new("/var/www/html/app", Arc::new(OsFs));
        assert_eq!(node.base_name(), "app");

        let root = FilesystemNode::new("/", Arc::new(OsFs));
        assert_eq!(root.base_name(), "/");
    }

    #[test]
    fn missing_path_degrades_to_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let mut node = FilesystemNode::new(tmp.path().join("gone"), Arc::new(OsFs));

        assert_eq!(node.kind().unwrap(), NodeKind::Unknown);
        assert!(!node.is_link().unwrap());
        assert!(!node.is_readable().unwrap());
        assert_eq!(node.link_target().unwrap(), None);
        assert_eq!(node.total_size_mb().unwrap(), None);
        assert_eq!(node.file_count().unwrap(), None);

        node.expand_children().unwrap();
        assert!(node.children().is_none());
    }
}
