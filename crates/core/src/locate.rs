//! Contract discovery.
//!
//! Contracts live either in an [`EmbeddedTree`] (read-only, in memory) or in
//! a filesystem directory. Every file whose name ends with the contract
//! extension becomes one [`ContractIdentity`]; sidecar files next to it are
//! read back through the same store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::LocateError;

/// Where a contract was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Embedded,
    Filesystem,
}

/// A read-only contract tree held in memory, keyed by `/`-separated paths
/// relative to the tree root.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTree {
    root: String,
    files: Arc<BTreeMap<String, Vec<u8>>>,
}

impl EmbeddedTree {
    pub fn new(root: impl Into<String>) -> Self {
        EmbeddedTree {
            root: root.into(),
            files: Arc::new(BTreeMap::new()),
        }
    }

    pub fn with_file(mut self, path: impl AsRef<str>, contents: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref().trim_start_matches('/').to_string();
        Arc::make_mut(&mut self.files).insert(path, contents.into());
        self
    }

    /// Name of the tree root. A filesystem overlay skips a subtree with this name.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
enum Store {
    Embedded(EmbeddedTree),
    Filesystem(PathBuf),
}

/// One discovered contract. Immutable once created.
#[derive(Debug, Clone)]
pub struct ContractIdentity {
    /// Path relative to the source root, `/`-separated, extension included.
    pub relative_path: String,
    /// Directory part of `relative_path`; empty at the root.
    pub directory: String,
    pub file_name: String,
    pub content: String,
    store: Store,
}

impl ContractIdentity {
    fn new(relative_path: String, content: String, store: Store) -> Self {
        let (directory, file_name) = match relative_path.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), relative_path.clone()),
        };
        ContractIdentity {
            relative_path,
            directory,
            file_name,
            content,
            store,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.store {
            Store::Embedded(_) => SourceKind::Embedded,
            Store::Filesystem(_) => SourceKind::Filesystem,
        }
    }

    /// File name without its last extension: `hello.slang` -> `hello`.
    pub fn stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.file_name,
        }
    }

    /// Relative path without extension, used as the command path and URL path.
    pub fn route(&self) -> String {
        join(&self.directory, self.stem())
    }

    /// Name of a sidecar file next to this contract: `<stem>.<suffix>`.
    pub fn sidecar_name(&self, suffix: &str) -> String {
        format!("{}.{}", self.stem(), suffix)
    }

    /// Human-readable location of a file next to this contract.
    pub fn sibling_location(&self, name: &str) -> String {
        let relative = join(&self.directory, name);
        match &self.store {
            Store::Embedded(tree) => join(tree.root(), &relative),
            Store::Filesystem(root) => root.join(&relative).display().to_string(),
        }
    }

    /// Human-readable location of the contract itself.
    pub fn location(&self) -> String {
        self.sibling_location(&self.file_name)
    }

    /// Read a file that lives in the same directory as the contract.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn read_sibling(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let relative = join(&self.directory, name);
        match &self.store {
            Store::Embedded(tree) => Ok(tree.get(&relative).map(<[u8]>::to_vec)),
            Store::Filesystem(root) => match fs::read(root.join(&relative)) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            },
        }
    }
}

/// A root to enumerate contracts from.
#[derive(Debug, Clone)]
pub enum ContractSource {
    Embedded(EmbeddedTree),
    /// A filesystem directory. A subdirectory named `skip` is not descended
    /// into, so an overlay directory that mirrors an embedded tree does not
    /// process the embedded subtree twice.
    Directory { root: PathBuf, skip: Option<String> },
}

impl ContractSource {
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        ContractSource::Directory {
            root: root.into(),
            skip: None,
        }
    }

    /// A filesystem directory scanned on top of `tree`.
    pub fn overlay(root: impl Into<PathBuf>, tree: &EmbeddedTree) -> Self {
        ContractSource::Directory {
            root: root.into(),
            skip: Some(tree.root().to_string()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ContractSource::Embedded(_) => SourceKind::Embedded,
            ContractSource::Directory { .. } => SourceKind::Filesystem,
        }
    }

    /// Visit every contract under this root, in sorted path order.
    ///
    /// The first walk error stops the walk and is returned; contracts
    /// already visited are not rolled back.
    pub fn walk<F>(&self, extension: &str, mut visit: F) -> Result<(), LocateError>
    where
        F: FnMut(ContractIdentity),
    {
        match self {
            ContractSource::Embedded(tree) => {
                for path in tree.paths() {
                    if !has_extension(path.rsplit('/').next().unwrap_or(path), extension) {
                        continue;
                    }
                    let bytes = tree.get(path).unwrap_or_default();
                    let content = String::from_utf8_lossy(bytes).into_owned();
                    visit(ContractIdentity::new(
                        path.to_string(),
                        content,
                        Store::Embedded(tree.clone()),
                    ));
                }
                Ok(())
            }
            ContractSource::Directory { root, skip } => {
                let walker = WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|entry| {
                        let skipped = entry.depth() > 0
                            && entry.file_type().is_dir()
                            && skip.is_some()
                            && entry.file_name().to_str() == skip.as_deref();
                        !skipped
                    });
                for entry in walker {
                    let entry = entry.map_err(|source| LocateError::Walk {
                        root: root.clone(),
                        source,
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if !has_extension(&entry.file_name().to_string_lossy(), extension) {
                        continue;
                    }
                    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    let bytes = fs::read(entry.path()).map_err(|source| LocateError::Read {
                        path: entry.path().to_path_buf(),
                        source,
                    })?;
                    // Invalid UTF-8 is replaced, not rejected.
                    let content = String::from_utf8_lossy(&bytes).into_owned();
                    visit(ContractIdentity::new(
                        slash_path(relative),
                        content,
                        Store::Filesystem(root.clone()),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Result of one discovery pass over several sources.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Contracts sorted by relative path.
    pub contracts: Vec<ContractIdentity>,
    /// One entry per source whose walk was cut short.
    pub errors: Vec<LocateError>,
}

/// Enumerate contracts from every source, in order.
///
/// When two sources yield the same relative path, a filesystem entry wins
/// over an embedded one.
pub fn discover(sources: &[ContractSource], extension: &str) -> Discovery {
    let mut found: BTreeMap<String, ContractIdentity> = BTreeMap::new();
    let mut errors = Vec::new();

    for source in sources {
        let result = source.walk(extension, |contract| {
            let shadowed = found.get(&contract.relative_path).is_some_and(|existing| {
                existing.source_kind() == SourceKind::Filesystem
                    && contract.source_kind() == SourceKind::Embedded
            });
            if !shadowed {
                found.insert(contract.relative_path.clone(), contract);
            }
        });
        if let Err(e) = result {
            log::warn!("contract discovery stopped early: {}", e);
            errors.push(e);
        }
    }

    Discovery {
        contracts: found.into_values().collect(),
        errors,
    }
}

/// Contracts grouped by directory, one node per directory segment.
///
/// Children keep first-seen order, so building from a sorted contract list
/// gives a deterministic tree.
#[derive(Debug, Default)]
pub struct ContractTree<'a> {
    pub contracts: Vec<&'a ContractIdentity>,
    pub directories: Vec<(String, ContractTree<'a>)>,
}

impl<'a> ContractTree<'a> {
    pub fn build(contracts: &'a [ContractIdentity]) -> Self {
        let mut tree = ContractTree::default();
        for contract in contracts {
            let mut node = &mut tree;
            for segment in contract.directory.split('/').filter(|s| !s.is_empty()) {
                node = node.child(segment);
            }
            node.contracts.push(contract);
        }
        tree
    }

    fn child(&mut self, segment: &str) -> &mut ContractTree<'a> {
        let index = match self.directories.iter().position(|(name, _)| name == segment) {
            Some(index) => index,
            None => {
                self.directories
                    .push((segment.to_string(), ContractTree::default()));
                self.directories.len() - 1
            }
        };
        &mut self.directories[index].1
    }
}

/// Contracts grouped by their directory, for flat listings.
pub fn by_directory(contracts: &[ContractIdentity]) -> BTreeMap<&str, Vec<&ContractIdentity>> {
    let mut groups: BTreeMap<&str, Vec<&ContractIdentity>> = BTreeMap::new();
    for contract in contracts {
        groups
            .entry(contract.directory.as_str())
            .or_default()
            .push(contract);
    }
    groups
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name.len() > extension.len() && file_name.ends_with(extension)
}

fn join(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", directory, name)
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
