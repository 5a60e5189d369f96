//! Path filtering for discovery.
//!
//! Exclusion is glob-based and applied to paths relative to the input
//! directory; a match on any ancestor excludes everything below it.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

#[derive(Debug, Clone)]
pub(crate) struct PathFilter {
    exclude: GlobSet,
}

impl PathFilter {
    /// Compiles the exclude patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid glob.
    pub(crate) fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            exclude: Self::build_globset(patterns)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::config(format!("Invalid glob pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if `relative` (or one of its ancestors) is excluded.
    pub(crate) fn is_excluded(&self, relative: &Path) -> bool {
        if relative.as_os_str().is_empty() {
            return false;
        }

        relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.exclude.is_match(p))
    }
}

/// Returns true if the file name ends with one of the extensions.
///
/// Matching is a case-sensitive suffix test, so multi-part suffixes such as
/// `.tar.gz` work as well.
#[must_use]
pub(crate) fn has_code_extension(path: &Path, extensions: &[String]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_excludes_matching_directory_and_children() {
        let filter = PathFilter::new(&exts(&["**/target", "**/.git"])).unwrap();

        assert!(filter.is_excluded(Path::new("target")));
        assert!(filter.is_excluded(Path::new("target/debug/main.rs")));
        assert!(filter.is_excluded(Path::new("crates/a/target/x.rs")));
        assert!(filter.is_excluded(Path::new(".git/config")));
        assert!(!filter.is_excluded(Path::new("src/target.rs")));
        assert!(!filter.is_excluded(Path::new("")));
    }

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let filter = PathFilter::new(&[]).unwrap();
        assert!(!filter.is_excluded(Path::new("src/main.rs")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PathFilter::new(&exts(&["[invalid"])).is_err());
    }

    #[test]
    fn test_has_code_extension_is_case_sensitive() {
        let allowed = exts(&[".py", ".rs"]);

        assert!(has_code_extension(Path::new("src/a.py"), &allowed));
        assert!(has_code_extension(Path::new("lib.rs"), &allowed));
        assert!(!has_code_extension(Path::new("A.PY"), &allowed));
        assert!(!has_code_extension(Path::new("notes.txt"), &allowed));
        assert!(!has_code_extension(Path::new("py"), &allowed));
    }

    #[test]
    fn test_has_code_extension_multi_part_suffix() {
        let allowed = exts(&[".d.ts"]);

        assert!(has_code_extension(Path::new("types.d.ts"), &allowed));
        assert!(!has_code_extension(Path::new("index.ts"), &allowed));
    }
}
