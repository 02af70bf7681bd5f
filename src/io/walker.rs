use crate::core::Language;
use ignore::WalkBuilder;
use std::io;
use std::path::{Path, PathBuf};

pub struct FileWalker {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl FileWalker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ignore_patterns: vec![],
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Every supported source file under the root, sorted so repeated runs
    /// see the same order. Respects .gitignore; the configured glob patterns
    /// exclude on top of that.
    pub fn walk(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .build();

        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            let path = entry.path();

            if path.is_file() && self.should_process(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn should_process(&self, path: &Path) -> bool {
        if Language::from_path(path) == Language::Unknown {
            return false;
        }

        let path_str = path.to_string_lossy();
        !self.ignore_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
        })
    }
}

pub fn find_project_files(root: &Path, ignore_patterns: &[String]) -> io::Result<Vec<PathBuf>> {
    FileWalker::new(root.to_path_buf())
        .with_ignore_patterns(ignore_patterns.to_vec())
        .walk()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "// content\n").unwrap();
    }

    #[test]
    fn walks_only_supported_languages() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "web/app.ts");
        touch(dir.path(), "scripts/tool.py");
        touch(dir.path(), "README.md");
        touch(dir.path(), "data.csv");

        let files = find_project_files(dir.path(), &[]).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn ignore_patterns_exclude_matches() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "vendor/dep.rs");

        let files = find_project_files(dir.path(), &["*vendor*".to_string()]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/lib.rs"));
    }

    #[test]
    fn output_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.rs");
        touch(dir.path(), "a.rs");
        touch(dir.path(), "c.py");

        let first = find_project_files(dir.path(), &[]).unwrap();
        let second = find_project_files(dir.path(), &[]).unwrap();
        assert_eq!(first, second);
    }
}
