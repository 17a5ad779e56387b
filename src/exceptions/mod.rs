//! Curated false-positive / false-negative dependency lists.

pub mod models;
pub mod remote;
pub mod storage;

use anyhow::Result;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use models::{parse_exception_entries, ExceptionEntry, ExceptionKind, ExceptionsDocument, EXCEPTIONS_DIR};
pub use remote::{GitCheckoutSource, RemoteExceptions, RemoteFileSource, RemoteRepository};
pub use storage::{read_exceptions, write_exceptions};

/// Local entries and remote names of one kind. Remote names are never persisted.
#[derive(Debug, Clone, Default)]
struct ExceptionSet {
    local: HashMap<String, String>,
    remote: HashSet<String>,
}

impl ExceptionSet {
    fn from_entries(entries: Vec<ExceptionEntry>) -> Self {
        Self {
            local: entries.into_iter().map(|entry| (entry.name, entry.comment)).collect(),
            remote: HashSet::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.local.contains_key(name) || self.remote.contains(name)
    }

    fn names(&self) -> BTreeSet<String> {
        self.local.keys().chain(self.remote.iter()).cloned().collect()
    }

    fn local_entries(&self) -> Vec<ExceptionEntry> {
        let mut entries: Vec<ExceptionEntry> = self
            .local
            .iter()
            .map(|(name, comment)| ExceptionEntry::new(name.as_str(), comment.as_str()))
            .collect();
        entries.sort();
        entries
    }

    fn len(&self) -> usize {
        self.local.len() + self.remote.iter().filter(|name| !self.local.contains_key(*name)).count()
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionManager {
    root: PathBuf,
    false_positives: ExceptionSet,
    false_negatives: ExceptionSet,
}

impl ExceptionManager {
    /// Load both exception files under `root`, merging the remote ones when given
    pub fn load(root: impl Into<PathBuf>, remote: Option<&RemoteExceptions>) -> Self {
        let root = root.into();
        let mut manager = Self {
            false_positives: ExceptionSet::from_entries(read_exceptions(
                &root.join(ExceptionKind::FalsePositive.relative_path()),
            )),
            false_negatives: ExceptionSet::from_entries(read_exceptions(
                &root.join(ExceptionKind::FalseNegative.relative_path()),
            )),
            root,
        };

        if let Some(remote) = remote {
            manager.merge_remote(remote);
        }

        info!(
            "Loaded {} FPs and {} FNs",
            manager.false_positives.len(),
            manager.false_negatives.len()
        );
        manager
    }

    /// No exceptions at all, rooted nowhere in particular
    pub fn empty() -> Self {
        Self {
            root: PathBuf::from("."),
            false_positives: ExceptionSet::default(),
            false_negatives: ExceptionSet::default(),
        }
    }

    fn set(&self, kind: ExceptionKind) -> &ExceptionSet {
        match kind {
            ExceptionKind::FalsePositive => &self.false_positives,
            ExceptionKind::FalseNegative => &self.false_negatives,
        }
    }

    fn set_mut(&mut self, kind: ExceptionKind) -> &mut ExceptionSet {
        match kind {
            ExceptionKind::FalsePositive => &mut self.false_positives,
            ExceptionKind::FalseNegative => &mut self.false_negatives,
        }
    }

    fn merge_remote(&mut self, remote: &RemoteExceptions) {
        for kind in ExceptionKind::ALL {
            let path = kind.relative_path();
            match remote.source.fetch_file(&remote.repository, &path) {
                Ok(Some(content)) => match parse_exception_entries(&content) {
                    Ok(entries) => {
                        debug!("Merged {} remote {} entries from {}", entries.len(), kind, remote.repository);
                        self.set_mut(kind)
                            .remote
                            .extend(entries.into_iter().map(|entry| entry.name));
                    }
                    Err(e) => warn!("Ignoring malformed {} in {}: {:#}", path, remote.repository, e),
                },
                Ok(None) => debug!("No {} in {}", path, remote.repository),
                Err(e) => warn!("Failed to fetch {} from {}: {:#}", path, remote.repository, e),
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, kind: ExceptionKind) -> PathBuf {
        self.root.join(kind.relative_path())
    }

    pub fn is_false_positive(&self, name: &str) -> bool {
        self.false_positives.contains(name)
    }

    pub fn is_false_negative(&self, name: &str) -> bool {
        self.false_negatives.contains(name)
    }

    pub fn contains(&self, kind: ExceptionKind, name: &str) -> bool {
        self.set(kind).contains(name)
    }

    /// Local and remote names, sorted
    pub fn names(&self, kind: ExceptionKind) -> BTreeSet<String> {
        self.set(kind).names()
    }

    pub fn false_positives(&self) -> BTreeSet<String> {
        self.names(ExceptionKind::FalsePositive)
    }

    pub fn false_negatives(&self) -> BTreeSet<String> {
        self.names(ExceptionKind::FalseNegative)
    }

    pub fn local_entries(&self, kind: ExceptionKind) -> Vec<ExceptionEntry> {
        self.set(kind).local_entries()
    }

    /// Record a local exception and rewrite its file
    pub fn add(&mut self, kind: ExceptionKind, name: &str, comment: &str) -> Result<()> {
        self.set_mut(kind).local.insert(name.to_string(), comment.to_string());
        self.persist(kind)
    }

    pub fn persist(&self, kind: ExceptionKind) -> Result<()> {
        write_exceptions(&self.path(kind), kind, self.local_entries(kind))
    }

    /// Write empty exception files where none exist yet. Returns the created paths.
    pub fn create_template_files(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for kind in ExceptionKind::ALL {
            let path = self.path(kind);
            if path.exists() {
                continue;
            }
            write_exceptions(&path, kind, Vec::new())?;
            info!("Created template {} file: {}", kind, path.display());
            created.push(path);
        }
        Ok(created)
    }
}
