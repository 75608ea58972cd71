//! FMU staging and archive assembly.
//!
//! A finished FMU is an ordinary zip archive with a fixed internal layout:
//! the post-edited descriptor at the archive root and the compiled shared
//! library at `binaries/<platform>/<model>.<ext>`. Staging materializes
//! that layout under `fmu_dir/` inside the generated project tree; assembly
//! zips the staged tree with entry names relative to the staging root. The
//! intermediate archive is left in the project tree for inspection.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::descriptor::DESCRIPTOR_FILE_NAME;
use crate::error::{Error, Result};
use crate::forge::Platform;

/// Name of the staging directory inside the generated project tree.
pub const STAGING_DIR_NAME: &str = "fmu_dir";

/// Name of the binaries directory at the archive root.
pub const BINARIES_DIR_NAME: &str = "binaries";

/// Copy the post-edited descriptor and the built shared library into the
/// staging layout below the project tree. Returns the staging root.
pub fn stage_package(
    project_dir: &Path,
    descriptor: &Path,
    binary: &Path,
    model_name: &str,
    platform: Platform,
) -> Result<PathBuf> {
    let staging = project_dir.join(STAGING_DIR_NAME);
    let binary_dir = staging.join(BINARIES_DIR_NAME).join(platform.to_string());
    std::fs::create_dir_all(&binary_dir)?;

    let binary_name = format!("{}.{}", model_name, platform.binary_extension());
    copy_into(binary, &binary_dir.join(binary_name))?;
    copy_into(descriptor, &staging.join(DESCRIPTOR_FILE_NAME))?;

    debug!(staging = %staging.display(), "package staged");
    Ok(staging)
}

fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst).map_err(|e| {
        Error::ArchiveAssembly(format!(
            "cannot copy {} to {}: {}",
            src.display(),
            dst.display(),
            e
        ))
    })?;
    Ok(())
}

/// Zip the staged tree into `archive_path`.
///
/// Entry names are relative to the staging root and use forward slashes,
/// so the descriptor sits at the archive root regardless of host platform.
/// Entries are visited in sorted order to keep archives deterministic.
pub fn write_archive(staging_root: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default();

    for entry in WalkDir::new(staging_root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let name = entry_name(staging_root, entry.path())?;
        if entry.file_type().is_dir() {
            writer.add_directory(name, options).map_err(zip_error)?;
        } else {
            writer.start_file(name, options).map_err(zip_error)?;
            let content = std::fs::read(entry.path())?;
            writer.write_all(&content)?;
        }
    }

    writer.finish().map_err(zip_error)?;
    debug!(archive = %archive_path.display(), "archive written");
    Ok(())
}

/// Archive entry name for a staged path: relative to the staging root,
/// forward slashes between components.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::ArchiveAssembly(format!("{} escaped the staging root", path.display()))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::ArchiveAssembly(e.to_string())
}
