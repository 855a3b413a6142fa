use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Extension bucket for files without one.
const NO_EXTENSION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    /// Relative to the dataset root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

impl DatasetFile {
    pub fn extension(&self) -> Option<String> {
        self.abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Dataset summary handed to the narrative collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub file_count: usize,
    pub total_bytes: u64,
    pub file_types: BTreeMap<String, usize>,
}

/// Regular files of one dataset, sorted by relative path.
#[derive(Debug, Clone)]
pub struct DatasetInventory {
    files: Vec<DatasetFile>,
}

impl DatasetInventory {
    /// Walk `root` without following symlinks. Entries that cannot be read
    /// are logged and left out.
    pub fn collect(root: &Path) -> Self {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable dataset entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(DatasetFile {
                rel_path: normalize_rel_path(rel),
                abs_path: entry.into_path(),
                size,
            });
        }
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Self { files }
    }

    pub fn files(&self) -> &[DatasetFile] {
        &self.files
    }

    pub fn stats(&self) -> DatasetStats {
        let mut stats = DatasetStats::default();
        for file in &self.files {
            stats.file_count += 1;
            stats.total_bytes = stats.total_bytes.saturating_add(file.size);
            let ext = file
                .extension()
                .unwrap_or_else(|| NO_EXTENSION.to_string());
            *stats.file_types.entry(ext).or_insert(0) += 1;
        }
        stats
    }
}

fn normalize_rel_path(rel: &Path) -> String {
    let mut out = String::new();
    for comp in rel.components() {
        if let Component::Normal(name) = comp {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&name.to_string_lossy());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str) -> DatasetFile {
        DatasetFile {
            rel_path: rel.to_string(),
            abs_path: PathBuf::from("/d").join(rel),
            size: 10,
        }
    }

    #[test]
    fn image_detection_is_case_insensitive() {
        assert!(file("a/photo.JPG").is_image());
        assert!(file("b.png").is_image());
        assert!(!file("notes.txt").is_image());
        assert!(!file("README").is_image());
    }

    #[test]
    fn stats_bucket_by_lowercase_extension() {
        let inv = DatasetInventory {
            files: vec![file("a.TXT"), file("b.txt"), file("Makefile")],
        };
        let stats = inv.stats();
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_bytes, 30);
        assert_eq!(stats.file_types.get("txt"), Some(&2));
        assert_eq!(stats.file_types.get("unknown"), Some(&1));
    }

    #[test]
    fn rel_paths_use_forward_slashes() {
        assert_eq!(normalize_rel_path(Path::new("a").join("b").join("c.txt").as_path()), "a/b/c.txt");
    }
}
