use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::fs::{FileSystem, OsFs};
use crate::model::{FilesystemNode, NodeKind};

/// Builds bounded-depth trees of [`FilesystemNode`] under a fixed root.
///
/// Holds no node state: every call builds fresh nodes and hands ownership to
/// the caller.
pub struct FilesystemRepository {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FilesystemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_filesystem(root, Arc::new(OsFs))
    }

    pub fn with_filesystem(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unclassified, unexpanded node for `path`.
    pub fn node(&self, path: impl Into<PathBuf>) -> FilesystemNode {
        FilesystemNode::new(path, Arc::clone(&self.fs))
    }

    /// Node for `path` with `depth` directory levels expanded below it.
    ///
    /// `depth == 0` returns the node unexpanded. Files are never expanded.
    /// Only a missing or unlistable `path` is an error; descendants that
    /// cannot be listed stay unexpanded.
    pub fn build_tree(&self, path: impl AsRef<Path>, depth: usize) -> FsResult<FilesystemNode> {
        let path = path.as_ref();
        let mut node = self.node(path);
        if depth == 0 {
            return Ok(node);
        }
        if node.kind()? == NodeKind::Unknown {
            // a refused lookup looks missing to stat; listing tells the two apart
            return Err(match self.fs.read_dir(path) {
                Err(e) => e,
                Ok(_) => FsError::NotFound {
                    path: path.to_path_buf(),
                },
            });
        }
        node.expand_children()?;
        expand_descendants(&mut node, depth - 1)?;
        Ok(node)
    }

    /// Direct entries of the root, sorted for display.
    pub fn list_root(&self) -> FsResult<Vec<FilesystemNode>> {
        self.list_sorted(&self.root)
    }

    /// Direct entries of `relative` under the root, sorted for display.
    pub fn list_subdirectory(&self, relative: impl AsRef<Path>) -> FsResult<Vec<FilesystemNode>> {
        let path = self.subdirectory_path(relative);
        self.list_sorted(&path)
    }

    /// Entries of `relative` under the root expanded `depth` levels deep,
    /// with every expanded level sorted for display.
    pub fn list_tree(
        &self,
        relative: impl AsRef<Path>,
        depth: usize,
    ) -> FsResult<Vec<FilesystemNode>> {
        let path = self.subdirectory_path(relative);
        let node = self.build_tree(&path, depth)?;
        sort_levels(node.into_children().unwrap_or_default())
    }

    /// `root + separator + relative`; leading separators on `relative` are ignored.
    pub fn subdirectory_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = relative
            .as_ref()
            .components()
            .skip_while(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        if relative.as_os_str().is_empty() {
            return self.root.clone();
        }
        self.root.join(relative)
    }

    fn list_sorted(&self, path: &Path) -> FsResult<Vec<FilesystemNode>> {
        let node = self.build_tree(path, 1)?;
        let children = node.into_children().unwrap_or_default();
        debug!(path = %path.display(), entries = children.len(), "listing");
        sort_for_display(children)
    }
}

fn expand_descendants(node: &mut FilesystemNode, depth: usize) -> FsResult<()> {
    if depth == 0 {
        return Ok(());
    }
    let Some(children) = node.children_mut() else {
        return Ok(());
    };
    for child in children.iter_mut() {
        if !child.is_directory()? {
            continue;
        }
        match child.expand_children() {
            Ok(()) => expand_descendants(child, depth - 1)?,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(error = %e, "leaving directory unexpanded"),
        }
    }
    Ok(())
}

fn sort_levels(nodes: Vec<FilesystemNode>) -> FsResult<Vec<FilesystemNode>> {
    let mut sorted = sort_for_display(nodes)?;
    for node in &mut sorted {
        if let Some(children) = node.take_children() {
            node.set_children(sort_levels(children)?);
        }
    }
    Ok(sorted)
}

/// Directories first, then full paths compared ignoring ASCII case.
/// The sort is stable, so paths equal under that comparison keep their order.
pub fn sort_for_display(nodes: Vec<FilesystemNode>) -> FsResult<Vec<FilesystemNode>> {
    let mut keyed = nodes
        .into_iter()
        .map(|node| -> FsResult<(bool, FilesystemNode)> { Ok((node.is_directory()?, node)) })
        .collect::<FsResult<Vec<_>>>()?;
    keyed.sort_by(|(a_dir, a), (b_dir, b)| {
        display_order(*a_dir, a.full_path(), *b_dir, b.full_path())
    });
    Ok(keyed.into_iter().map(|(_, node)| node).collect())
}

pub fn display_order(a_is_dir: bool, a: &Path, b_is_dir: bool, b: &Path) -> Ordering {
    b_is_dir
        .cmp(&a_is_dir)
        .then_with(|| cmp_ignore_ascii_case(a, b))
}

fn cmp_ignore_ascii_case(a: &Path, b: &Path) -> Ordering {
    let a = a.as_os_str().as_encoded_bytes();
    let b = b.as_os_str().as_encoded_bytes();
    a.iter()
        .map(u8::to_ascii_lowercase)
        .cmp(b.iter().map(u8::to_ascii_lowercase))
}

/// Compute the aggregate size of each node, and of every expanded
/// descendant, on the rayon pool.
///
/// Results land in each node's own cache; the slice order is untouched.
pub fn prefetch_sizes(nodes: &[FilesystemNode]) -> FsResult<()> {
    nodes.par_iter().try_for_each(|node| {
        node.total_size_mb()?;
        match node.children() {
            Some(children) => prefetch_sizes(children),
            None => Ok(()),
        }
    })
}
