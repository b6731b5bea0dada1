// src/config.rs

use crate::diff::DEFAULT_CONTEXT_LINES;
use std::path::PathBuf;

pub const DEFAULT_OUTPUT_DIR: &str = "public";
pub const DEFAULT_STYLE_PATH: &str = "../static/styles.css";

/// Everything a build needs to know, independent of how it was collected
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the repository to render
    pub repository: PathBuf,
    /// Display name used in page titles and the home link
    pub name: String,
    /// Root of the generated site
    pub output: PathBuf,
    /// Maximum number of commits per branch log, `None` for all of them
    pub log_limit: Option<usize>,
    /// Stylesheet location relative to the output root
    pub style_path: String,
    /// Unchanged lines shown around each change
    pub context_lines: usize,
    /// Worker threads, 0 picks one per CPU
    pub jobs: usize,
}

impl Config {
    pub fn new(repository: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Config {
            repository: repository.into(),
            name: name.into(),
            output: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_limit: None,
            style_path: DEFAULT_STYLE_PATH.to_string(),
            context_lines: DEFAULT_CONTEXT_LINES,
            jobs: 0,
        }
    }
}
