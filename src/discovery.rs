use crate::{
    config::Config,
    error::{Error, Result},
    filter::{PathFilter, has_code_extension},
};
use std::path::{self, Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Counters collected while walking the input tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Files whose name matched a configured extension
    pub matched: usize,

    /// Files skipped by extension or exclusion
    pub skipped: usize,

    /// Entries that could not be read
    pub errors: usize,
}

/// A candidate file found under the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Path relative to the input directory
    pub relative_path: PathBuf,
}

/// Lazy, deterministic walk over the input directory.
///
/// Entries are visited depth-first with each directory's children sorted by
/// file name, so two runs over an unchanged tree yield the same sequence.
/// Unreadable entries are yielded as errors and iteration continues.
pub struct Discovery {
    root: PathBuf,
    extensions: Vec<String>,
    filter: PathFilter,
    skip_paths: Vec<PathBuf>,
    walker: walkdir::IntoIter,
    stats: DiscoveryStats,
}

impl Discovery {
    /// Prepares a walk of `config.input_directory`.
    ///
    /// The output directory and the results file are never yielded, even
    /// when they live inside the input tree.
    ///
    /// # Errors
    ///
    /// Returns a discovery error if the input directory does not exist or is
    /// not a directory, and a configuration error for invalid exclude globs.
    pub fn new(config: &Config) -> Result<Self> {
        let input = &config.input_directory;

        if !input.exists() {
            return Err(Error::discovery(input, "directory does not exist"));
        }

        if !input.is_dir() {
            return Err(Error::discovery(input, "path is not a directory"));
        }

        let root = absolute(input)?;

        let mut skip_paths = vec![absolute(&config.results_file)?];
        if let Some(output_dir) = &config.output_dir {
            let output = absolute(output_dir)?;
            // Prune the output tree only when it sits strictly below the root.
            if output.starts_with(&root) && output != root {
                skip_paths.push(output);
            } else if root.starts_with(&output) {
                warn!(
                    "Output directory {} contains the input directory; enhanced files will be written into the input tree",
                    output.display()
                );
            }
        }

        debug!("Starting scan of {}", root.display());

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root,
            extensions: config.code_extensions.clone(),
            filter: PathFilter::new(&config.exclude)?,
            skip_paths,
            walker,
            stats: DiscoveryStats::default(),
        })
    }

    /// Returns the counters collected so far.
    #[must_use]
    pub const fn stats(&self) -> DiscoveryStats {
        self.stats
    }

    fn is_skipped_path(&self, path: &Path) -> bool {
        self.skip_paths.iter().any(|skip| path.starts_with(skip))
    }
}

impl Iterator for Discovery {
    type Item = Result<DiscoveredFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    warn!("Walk error at {}: {}", path.display(), e);
                    self.stats.errors += 1;
                    return Some(Err(Error::io(path, e.into())));
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let relative = pathdiff::diff_paths(path, &self.root)
                .unwrap_or_else(|| path.to_path_buf());

            if self.is_skipped_path(path) || self.filter.is_excluded(&relative) {
                trace!("Excluded: {}", relative.display());
                if entry.file_type().is_dir() {
                    self.walker.skip_current_dir();
                } else {
                    self.stats.skipped += 1;
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if !has_code_extension(path, &self.extensions) {
                trace!("Skipping by extension: {}", relative.display());
                self.stats.skipped += 1;
                continue;
            }

            self.stats.matched += 1;
            return Some(Ok(DiscoveredFile {
                absolute_path: path.to_path_buf(),
                relative_path: relative,
            }));
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path::absolute(path).map_err(|e| Error::discovery(path, e.to_string()))
}
