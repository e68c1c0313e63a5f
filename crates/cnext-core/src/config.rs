//! Configuration & project root (A2, §6 contract): option parsing and
//! root-marker search. Config-file loading uses `serde_json`, mirroring
//! the teacher's own JSON project-config convention.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;

/// Root markers, checked in priority order (§6 "Project root").
const ROOT_MARKERS: &[&str] = &["cnext.config.json", ".cnx", ".git", "package.json", "platformio.ini"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub include_dirs: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub header_out_dir: Option<PathBuf>,
    pub base_path: Option<PathBuf>,
    pub cpp_required: bool,
    pub parse_only: bool,
    pub no_cache: bool,
    pub debug_mode: bool,
    pub target: Option<String>,
    pub preprocess: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            include_dirs: Vec::new(),
            out_dir: None,
            header_out_dir: None,
            base_path: None,
            cpp_required: false,
            parse_only: false,
            no_cache: false,
            debug_mode: false,
            target: None,
            preprocess: true,
        }
    }
}

impl Options {
    /// CLI flags (`overrides`) win over config-file values, which win
    /// over built-in defaults (§6).
    pub fn merge(mut self, overrides: Options) -> Options {
        if !overrides.include_dirs.is_empty() {
            self.include_dirs = overrides.include_dirs;
        }
        self.out_dir = overrides.out_dir.or(self.out_dir);
        self.header_out_dir = overrides.header_out_dir.or(self.header_out_dir);
        self.base_path = overrides.base_path.or(self.base_path);
        self.cpp_required |= overrides.cpp_required;
        self.parse_only |= overrides.parse_only;
        self.no_cache |= overrides.no_cache;
        self.debug_mode |= overrides.debug_mode;
        self.target = overrides.target.or(self.target);
        self.preprocess = overrides.preprocess;
        self
    }
}

/// Loads `cnext.config.json` from `project_root`, if present.
pub fn load_config(fs: &dyn FileSystem, project_root: &Path) -> Options {
    let config_path = project_root.join("cnext.config.json");
    fs.read_file(&config_path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

/// Walks up from `start_dir` until a directory containing one of
/// `ROOT_MARKERS` is found (checked left-to-right within a directory, per
/// §6). Returns `None` (caching disabled) if no marker is ever found.
pub fn find_project_root(fs: &dyn FileSystem, start_dir: &Path) -> Option<PathBuf> {
    let mut current = Some(start_dir.to_path_buf());
    while let Some(dir) = current {
        for marker in ROOT_MARKERS {
            if fs.exists(&dir.join(marker)) {
                return Some(dir);
            }
        }
        current = dir.parent().map(|p| p.to_path_buf());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn finds_root_via_git_marker() {
        let fs = MemoryFileSystem::new().with_file("/proj/.git", "");
        let root = find_project_root(&fs, Path::new("/proj/src")).unwrap();
        assert_eq!(root, PathBuf::from("/proj"));
    }

    #[test]
    fn no_marker_disables_caching() {
        let fs = MemoryFileSystem::new();
        assert!(find_project_root(&fs, Path::new("/proj/src")).is_none());
    }

    #[test]
    fn cli_overrides_win_over_config_defaults() {
        let base = Options::default();
        let overrides = Options {
            debug_mode: true,
            ..Options::default()
        };
        let merged = base.merge(overrides);
        assert!(merged.debug_mode);
    }
}
