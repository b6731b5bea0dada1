// src/cli.rs

use clap::Parser;
use git_static::config::{DEFAULT_OUTPUT_DIR, DEFAULT_STYLE_PATH};
use git_static::diff::DEFAULT_CONTEXT_LINES;
use git_static::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the git repository to render
    pub repository: PathBuf,

    /// Name shown in page titles and the home link
    pub name: String,

    /// Directory the site is written to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Maximum number of commits on each branch log page, 0 for no limit
    #[arg(short, long, default_value_t = 0)]
    pub log_limit: usize,

    /// Stylesheet path, relative to the output directory
    #[arg(short, long, default_value = DEFAULT_STYLE_PATH)]
    pub style: String,

    /// Lines of context around each change in commit diffs
    #[arg(short = 'U', long, default_value_t = DEFAULT_CONTEXT_LINES)]
    pub context: usize,

    /// Worker threads, 0 for one per CPU
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Log every page written or skipped
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn config(&self) -> Config {
        Config {
            output: self.output.clone(),
            log_limit: (self.log_limit > 0).then_some(self.log_limit),
            style_path: self.style.clone(),
            context_lines: self.context,
            jobs: self.jobs,
            ..Config::new(&self.repository, &self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_the_config() {
        let args = Args::parse_from(["git-static", "repo", "demo"]);
        let config = args.config();
        assert_eq!(config.output, PathBuf::from("public"));
        assert_eq!(config.log_limit, None);
        assert_eq!(config.style_path, "../static/styles.css");
        assert_eq!(config.context_lines, 3);
        assert!(!args.verbose);
    }

    #[test]
    fn short_flags_are_accepted() {
        let args = Args::parse_from(["git-static", "-o", "site", "-l", "50", "-U", "5", "-j", "2", "-v", "repo", "demo"]);
        let config = args.config();
        assert_eq!(config.output, PathBuf::from("site"));
        assert_eq!(config.log_limit, Some(50));
        assert_eq!(config.context_lines, 5);
        assert_eq!(config.jobs, 2);
        assert!(args.verbose);
    }
}
