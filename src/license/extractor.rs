use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::archive::{archive_stem, unpack_to_scratch, ArchiveFormat};
use super::{Artifact, LicenseFileRecord, LicenseFormat, LicenseKind, LICENSES_DIR, THIRD_PARTY_DIR};

/// Inner archives nested deeper than this are not opened
pub const MAX_NESTING_DEPTH: usize = 3;

/// Everything found in one artifact
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactLicenses {
    pub records: Vec<LicenseFileRecord>,
    /// Whether `licenses/` exists at the artifact root
    pub has_licenses_dir: bool,
    /// Inner archives with neither a root `licenses/` nor a sibling `<stem>-licenses/`
    pub non_compliant_inner_archives: Vec<String>,
    /// Inner archives in a recognised but unsupported format
    pub unsupported_inner_archives: Vec<String>,
    /// Why the artifact could not be inspected at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl ArtifactLicenses {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn main_licenses(&self) -> impl Iterator<Item = &LicenseFileRecord> {
        self.records.iter().filter(|record| record.kind == LicenseKind::Main)
    }

    pub fn third_party_licenses(&self) -> impl Iterator<Item = &LicenseFileRecord> {
        self.records.iter().filter(|record| record.is_third_party())
    }
}

/// Artifact name -> licenses, in artifact order
pub type ExtractedLicenses = IndexMap<String, ArtifactLicenses>;

#[derive(Debug, Clone)]
pub struct LicenseExtractor {
    max_depth: usize,
    scratch_root: Option<PathBuf>,
}

impl Default for LicenseExtractor {
    fn default() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            scratch_root: None,
        }
    }
}

impl LicenseExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Extract every artifact in parallel; the result keeps input order
    pub fn extract_from_artifacts(&self, artifacts: &[Artifact]) -> ExtractedLicenses {
        let results: Vec<(String, ArtifactLicenses)> = artifacts
            .par_iter()
            .map(|artifact| {
                info!("Extracting licenses from {}", artifact.name);
                let licenses = self.extract_from_artifact(artifact);
                info!("Found {} license files in {}", licenses.records.len(), artifact.name);
                (artifact.name.clone(), licenses)
            })
            .collect();

        results.into_iter().collect()
    }

    pub fn extract_from_artifact(&self, artifact: &Artifact) -> ArtifactLicenses {
        if !artifact.path.is_file() {
            warn!("Artifact file not found: {}", artifact.path.display());
            return ArtifactLicenses::skipped("artifact file not found");
        }

        let file_name = artifact
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.name.clone());

        let Some(format) = ArchiveFormat::for_artifact(&file_name) else {
            warn!("Unsupported artifact format: {}", artifact.path.display());
            return ArtifactLicenses::skipped("unsupported artifact format");
        };

        let scratch = match unpack_to_scratch(&artifact.path, format, "license_extraction_", self.scratch_root.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => {
                error!("Error extracting licenses from {}: {:#}", artifact.path.display(), e);
                return ArtifactLicenses::skipped(format!("{:#}", e));
            }
        };

        let mut result = ArtifactLicenses::default();
        let root = scratch.path();
        let licenses_dir = root.join(LICENSES_DIR);
        if licenses_dir.is_dir() {
            result.has_licenses_dir = true;
            result.records.extend(read_licenses_dir(&licenses_dir, root, "main"));
        }
        self.scan_inner_archives(root, "", 1, &mut result);

        result
    }

    fn scan_inner_archives(&self, root: &Path, label_prefix: &str, depth: usize, out: &mut ArtifactLicenses) {
        for archive in find_inner_archives(root) {
            let relative = relative_slash_path(&archive, root);
            let label = format!("{}{}", label_prefix, relative);
            self.process_inner_archive(&archive, &label, depth, out);
        }
    }

    fn process_inner_archive(&self, archive: &Path, label: &str, depth: usize, out: &mut ArtifactLicenses) {
        let file_name = match archive.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return,
        };
        let Some(format) = ArchiveFormat::for_inner(&file_name) else {
            return;
        };

        info!("Found inner archive: {}", label);

        if !format.is_supported() {
            warn!("Compressed file format not yet supported: {}", label);
            out.unsupported_inner_archives.push(label.to_string());
            return;
        }

        if depth > self.max_depth {
            warn!("Not opening {}: nested deeper than {} levels", label, self.max_depth);
            return;
        }

        let scratch = match unpack_to_scratch(archive, format, "inner_archive_", self.scratch_root.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => {
                error!("Error processing inner archive {}: {:#}", label, e);
                out.non_compliant_inner_archives.push(label.to_string());
                return;
            }
        };

        let inner_licenses = scratch.path().join(LICENSES_DIR);
        let parent = archive.parent().unwrap_or_else(|| Path::new("."));
        let dedicated = parent.join(format!("{}-licenses", archive_stem(&file_name)));

        let has_inner = inner_licenses.is_dir();
        let has_dedicated = dedicated.is_dir();

        if !has_inner && !has_dedicated {
            warn!("Inner archive {} has no licenses/ directory", label);
            out.non_compliant_inner_archives.push(label.to_string());
            return;
        }

        if has_inner {
            let source = format!("inner_{}", file_name);
            out.records.extend(read_licenses_dir(&inner_licenses, scratch.path(), &source));
        }
        if has_dedicated {
            let source = format!("dedicated_{}", file_name);
            out.records.extend(read_licenses_dir(&dedicated, parent, &source));
        }

        self.scan_inner_archives(scratch.path(), &format!("{}!/", label), depth + 1, out);
    }
}

fn is_root_licenses_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == LICENSES_DIR
}

/// Archive files below `root`, outside the root `licenses/` directory, in name order
fn find_inner_archives(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_root_licenses_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| ArchiveFormat::for_inner(&entry.file_name().to_string_lossy()).is_some())
        .map(DirEntry::into_path)
        .collect()
}

fn license_format(file_name: &str) -> Option<LicenseFormat> {
    match file_name.rsplit_once('.') {
        Some((_, extension)) => LicenseFormat::from_extension(&extension.to_ascii_lowercase()),
        None if file_name.eq_ignore_ascii_case("license") => Some(LicenseFormat::Text),
        None => None,
    }
}

fn license_kind(relative_to_licenses: &Path, file_name: &str) -> LicenseKind {
    let in_third_party = relative_to_licenses
        .components()
        .any(|component| matches!(component, Component::Normal(part) if part == THIRD_PARTY_DIR));
    let is_direct_child = relative_to_licenses.components().count() == 1;
    let stem = file_name.split('.').next().unwrap_or(file_name);

    if !in_third_party && is_direct_child && stem.eq_ignore_ascii_case("license") {
        LicenseKind::Main
    } else {
        LicenseKind::ThirdParty
    }
}

fn relative_slash_path(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// License records under a licenses directory. Paths are reported relative to `base`.
fn read_licenses_dir(licenses_dir: &Path, base: &Path, source: &str) -> Vec<LicenseFileRecord> {
    let mut records = Vec::new();

    for entry in WalkDir::new(licenses_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(format) = license_format(&file_name) else {
            debug!("Skipping non-license file {}", entry.path().display());
            continue;
        };

        let relative = entry.path().strip_prefix(licenses_dir).unwrap_or(entry.path());
        let content = match fs::read(entry.path()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                error!("Error reading file {}: {}", entry.path().display(), e);
                String::new()
            }
        };

        records.push(LicenseFileRecord {
            kind: license_kind(relative, &file_name),
            format,
            source: source.to_string(),
            path: relative_slash_path(entry.path(), base),
            name: file_name,
            content,
        });
    }

    records
}
