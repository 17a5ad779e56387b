use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

/// Archive formats recognised inside build artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// zip, jar and nupkg share the zip container
    Zip,
    TarGz,
    /// Recognised but not unpacked
    Xz,
}

impl ArchiveFormat {
    /// Format of an outer artifact, by file name
    pub fn for_artifact(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") || lower.ends_with(".jar") || lower.ends_with(".nupkg") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }

    /// Format of an archive nested inside an artifact, by file name
    pub fn for_inner(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") {
            Some(ArchiveFormat::TarGz)
        } else if lower.ends_with(".txz") || lower.ends_with(".xz") {
            Some(ArchiveFormat::Xz)
        } else {
            None
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, ArchiveFormat::Xz)
    }
}

/// File name without its archive extension (`plugin.tar.gz` -> `plugin`)
pub fn archive_stem(file_name: &str) -> &str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") {
        return &file_name[..file_name.len() - ".tar.gz".len()];
    }
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Unpack into a fresh scratch directory, removed when the returned guard drops.
///
/// The directory is created under `scratch_root`, or the system temp dir.
pub fn unpack_to_scratch(
    path: &Path,
    format: ArchiveFormat,
    prefix: &str,
    scratch_root: Option<&Path>,
) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let scratch = match scratch_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .context("Failed to create scratch directory")?;
    unpack(path, format, scratch.path())?;
    Ok(scratch)
}

pub fn unpack(path: &Path, format: ArchiveFormat, destination: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open archive: {}", path.display()))?;

    match format {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(file)
                .with_context(|| format!("Failed to read zip archive: {}", path.display()))?;
            archive
                .extract(destination)
                .with_context(|| format!("Failed to unpack zip archive: {}", path.display()))?;
        }
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(file));
            archive
                .unpack(destination)
                .with_context(|| format!("Failed to unpack tar archive: {}", path.display()))?;
        }
        ArchiveFormat::Xz => {
            anyhow::bail!("Compressed file format not yet supported: {}", path.display());
        }
    }

    Ok(())
}
