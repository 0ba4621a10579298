use std::path::Path;

use kubephase_domain::ManifestPath;
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Recursively discover manifest files (`*.yaml`) under a root.
///
/// A root that is itself a manifest file yields just that file. Entries are
/// visited in file-name order within each directory.
///
/// # Errors
///
/// Returns an error if `root` does not exist or directory walking fails.
pub fn discover_manifests(root: &Path) -> std::result::Result<Vec<ManifestPath>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootDoesNotExist {
            root: root.to_path_buf(),
        });
    }

    let mut manifests = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(value) => value,
            Err(source) => {
                return Err(DiscoveryError::Walk {
                    root: root.to_path_buf(),
                    source,
                });
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        if let Ok(manifest) = ManifestPath::try_from(entry.path()) {
            manifests.push(manifest);
        }
    }

    Ok(manifests)
}

/// Discover manifests under every root, keeping root order.
///
/// # Errors
///
/// Returns the first discovery error encountered.
pub fn discover_all<P: AsRef<Path>>(
    roots: &[P],
) -> std::result::Result<Vec<ManifestPath>, DiscoveryError> {
    let mut manifests = Vec::new();
    for root in roots {
        manifests.extend(discover_manifests(root.as_ref())?);
    }
    Ok(manifests)
}
