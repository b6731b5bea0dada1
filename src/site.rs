// src/site.rs

//! Drives a full build: indexes first, then commit pages, branch pages and the
//! reference listing. Pages whose output is newer than their inputs are left alone.

use crate::config::Config;
use crate::diff::Formatter;
use crate::error::{Error, Result};
use crate::index::{CommitRefIndex, NoteIndex};
use crate::model::{BranchInfo, CommitInfo, EntryKind};
use crate::pages::*;
use crate::renderer;
use crate::repo::{CommitScope, Repo};
use chrono::{DateTime, FixedOffset, Utc};
use git2::Oid;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Directory holding one page per commit
pub const COMMIT_DIR: &str = "c";
/// Directory, below each branch, mirroring the branch's tree
pub const TREE_DIR: &str = "t";
pub const REFS_PAGE: &str = "refs.html";

/// Counts of pages produced and pages found up to date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub written: usize,
    pub skipped: usize,
}

/// One page to generate. `output` is relative to the output root.
#[derive(Debug)]
struct BuildTask<I> {
    output: PathBuf,
    input: I,
    logical_timestamp: DateTime<FixedOffset>,
}

#[derive(Debug)]
struct BlobPage {
    path: String,
    id: Oid,
    nav: NavData,
}

pub fn run(config: &Config) -> Result<BuildSummary> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(config.jobs).build()?;
    info!(threads = pool.current_num_threads(), "starting build");

    pool.install(|| {
        fs::create_dir_all(&config.output).map_err(|err| Error::io(&config.output, err))?;
        let repo = Repo::open(&config.repository)?;
        let site = Site::new(config, &repo)?;
        site.build(&repo)?;
        Ok(site.summary())
    })
}

/// Shared, read-only build state. Repository handles are per thread and never stored here.
struct Site<'a> {
    config: &'a Config,
    formatter: Formatter,
    notes: NoteIndex,
    refs: CommitRefIndex,
    written: AtomicUsize,
    skipped: AtomicUsize,
}

impl<'a> Site<'a> {
    fn new(config: &'a Config, repo: &Repo) -> Result<Self> {
        let notes = NoteIndex::from_repo(repo)?;
        let refs = CommitRefIndex::from_repo(repo)?;
        info!(annotated = notes.len(), referenced = refs.len(), "indexed notes and refs");

        Ok(Site {
            config,
            formatter: Formatter::new(config.context_lines),
            notes,
            refs,
            written: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }

    fn summary(&self) -> BuildSummary {
        BuildSummary {
            written: self.written.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn build(&self, repo: &Repo) -> Result<()> {
        self.build_commits(repo)?;

        let branches = repo.branches()?;
        let mut newest = DateTime::<FixedOffset>::default();
        for branch in &branches {
            let tip_date = self.build_branch(repo, branch)?;
            newest = newest.max(tip_date);
        }

        self.build_refs(repo, branches, newest)
    }

    fn build_commits(&self, repo: &Repo) -> Result<()> {
        self.create_dir(Path::new(COMMIT_DIR))?;

        let tasks: Vec<_> = repo
            .commits(CommitScope::All, None)?
            .into_iter()
            .map(|commit| {
                let logical_timestamp = match self.notes.latest_time(&commit.id) {
                    Some(note) => commit.committer.date.max(note),
                    None => commit.committer.date,
                };
                BuildTask {
                    output: Path::new(COMMIT_DIR).join(format!("{}.html", commit.id)),
                    input: commit,
                    logical_timestamp,
                }
            })
            .collect();
        info!(commits = tasks.len(), "rendering commit pages");

        self.run_group(tasks, |repo, task: &BuildTask<CommitInfo>| {
            let commit = &task.input;
            let data = CommitData::from_commit(repo, commit, self.notes.get(&commit.id), &self.formatter)?;
            let nav = NavData { commit: Some(commit.id), branch: None };
            let base = BaseData::new(self.config, &task.output, commit.id.to_string(), nav);
            Ok(renderer::render_commit(&base, &data))
        })
    }

    /// Renders every page of one branch and returns the tip's commit date.
    fn build_branch(&self, repo: &Repo, branch: &BranchInfo) -> Result<DateTime<FixedOffset>> {
        info!(branch = %branch.name, "rendering branch");
        let tip = repo.commit(branch.tip)?;
        let logical = tip.committer.date;
        let branch_dir = PathBuf::from(&branch.name);
        let tree_dir = branch_dir.join(TREE_DIR);
        self.create_dir(&tree_dir)?;

        let submodules = repo.submodules(tip.tree)?;
        let nav = NavData { commit: Some(tip.id), branch: Some(branch.name.clone()) };

        let index = branch_dir.join("index.html");
        if self.needs_build(&index, logical)? {
            let tree = TreeData::from_tree(repo, tip.tree, "", &submodules, TREE_DIR)?;
            let base = BaseData::new(self.config, &index, branch.name.as_str(), nav.clone());
            self.write(&index, &renderer::render_index(&base, &tree))?;
        }

        let log = branch_dir.join("log.html");
        if self.needs_build(&log, logical)? {
            let data = LogData::from_branch(repo, tip.id, &self.refs, self.config.log_limit)?;
            let base = BaseData::new(self.config, &log, format!("{} log", branch.name), nav.clone());
            self.write(&log, &renderer::render_log(&base, &data))?;
        }

        let mut blobs = Vec::new();
        for (path, entry) in repo.walk_tree(tip.tree)? {
            let output = tree_dir.join(format!("{path}.html"));
            match entry.kind {
                EntryKind::Dir => {
                    // Nested pages land inside this directory, so it must exist before any task runs.
                    self.create_dir(&tree_dir.join(&path))?;
                    if self.needs_build(&output, logical)? {
                        let tree = TreeData::from_tree(repo, entry.id, &path, &submodules, &entry.name)?;
                        let base = BaseData::new(self.config, &output, path.as_str(), nav.clone());
                        self.write(&output, &renderer::render_tree(&base, &tree))?;
                    }
                }
                EntryKind::Submodule | EntryKind::Empty => {}
                _ => blobs.push(BuildTask {
                    output,
                    input: BlobPage { path, id: entry.id, nav: nav.clone() },
                    logical_timestamp: logical,
                }),
            }
        }

        self.run_group(blobs, |repo, task: &BuildTask<BlobPage>| {
            let page = &task.input;
            let data = BlobData::from_blob(repo, page.id, &page.path)?;
            let base = BaseData::new(self.config, &task.output, page.path.as_str(), page.nav.clone());
            Ok(renderer::render_blob(&base, &data))
        })?;

        Ok(logical)
    }

    fn build_refs(&self, repo: &Repo, branches: Vec<BranchInfo>, newest_tip: DateTime<FixedOffset>) -> Result<()> {
        let tags = repo.tags()?;
        let logical = tags.iter().map(|tag| tag.date).fold(newest_tip, Ord::max);

        let output = Path::new(REFS_PAGE);
        if !self.needs_build(output, logical)? {
            return Ok(());
        }
        info!(branches = branches.len(), tags = tags.len(), "rendering references");
        let data = RefsData::new(branches.into_iter().map(|branch| branch.name).collect(), tags);
        let base = BaseData::new(self.config, output, "refs", NavData::default());
        self.write(output, &renderer::render_refs(&base, &data))
    }

    /// Renders a group of pages in parallel. The first failure stops the group.
    fn run_group<I, F>(&self, tasks: Vec<BuildTask<I>>, render: F) -> Result<()>
    where
        I: Sync,
        F: Fn(&Repo, &BuildTask<I>) -> Result<String> + Sync + Send,
    {
        if tasks.is_empty() {
            return Ok(());
        }
        let bar = ProgressBar::new(tasks.len() as u64);
        let repository = &self.config.repository;

        let result = tasks.par_iter().progress_with(bar.clone()).try_for_each_init(
            || Repo::open(repository),
            |repo, task| {
                if !self.needs_build(&task.output, task.logical_timestamp)? {
                    return Ok(());
                }
                let repo = repo.as_ref().map_err(|err| git2::Error::from_str(&err.to_string()))?;
                let html = render(repo, task)?;
                self.write(&task.output, &html)
            },
        );
        bar.finish_and_clear();
        result
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        self.config.output.join(relative)
    }

    fn create_dir(&self, relative: &Path) -> Result<()> {
        let path = self.output_path(relative);
        fs::create_dir_all(&path).map_err(|err| Error::io(path, err))
    }

    /// Checks the page against its logical timestamp and counts it as skipped when fresh.
    fn needs_build(&self, relative: &Path, logical: DateTime<FixedOffset>) -> Result<bool> {
        if is_fresh(&self.output_path(relative), logical)? {
            debug!(page = %relative.display(), "up to date");
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        Ok(true)
    }

    fn write(&self, relative: &Path, html: &str) -> Result<()> {
        write_page(&self.output_path(relative), html)?;
        debug!(page = %relative.display(), "written");
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A page is fresh when its file was modified strictly after `logical`. Missing files are stale.
pub fn is_fresh(path: &Path, logical: DateTime<FixedOffset>) -> Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(Error::io(path, err)),
    };
    let modified = metadata.modified().map_err(|err| Error::io(path, err))?;
    Ok(DateTime::<Utc>::from(modified) > logical)
}

/// Writes through a temporary file in the target directory so readers never see a partial page.
pub fn write_page(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|err| Error::io(dir, err))?;
    file.write_all(contents.as_bytes()).map_err(|err| Error::io(path, err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|err| Error::io(path, err))?;
    }

    file.persist(path)?;
    Ok(())
}
