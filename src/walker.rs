use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::BuildConfig;

/// Directory names never descended into, regardless of ignore files.
const HARD_EXCLUDED_DIRS: &[&str] = &["node_modules", "__pycache__", ".venv", "venv", "target"];

/// Walk a repository and collect every candidate file, sorted by path.
///
/// Respects `.gitignore` rules (even outside a git checkout), skips hidden
/// files, always excludes [`HARD_EXCLUDED_DIRS`], and applies the glob
/// patterns from `config.exclude`. Language classification is left to the
/// caller, so extension-less scripts are returned too.
pub fn walk_repository(root: &Path, config: &BuildConfig) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| HARD_EXCLUDED_DIRS.contains(&name)))
        })
        .build();

    let patterns: Vec<glob::Pattern> = config
        .exclude
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!("ignoring invalid exclude pattern {p:?}: {err}");
                None
            }
        })
        .collect();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("walk error: {err}");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if is_excluded(relative, &patterns) {
            debug!(path = %relative.display(), "excluded by config");
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    files
}

/// Relative path `/`-joined, as stored on nodes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True if the relative path, or any single component of it, matches an exclude pattern.
fn is_excluded(relative: &Path, patterns: &[glob::Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let path_str = relative.to_string_lossy();
    patterns.iter().any(|pattern| {
        pattern.matches(&path_str)
            || relative.components().any(|component| {
                component
                    .as_os_str()
                    .to_str()
                    .is_some_and(|s| pattern.matches(s))
            })
    })
}
