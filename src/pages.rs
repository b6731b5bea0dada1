// src/pages.rs

//! Page data handed to the renderer, plus the per-page identity every page shares.

use crate::config::Config;
use crate::diff::Formatter;
use crate::error::Result;
use crate::index::{CommitRefIndex, NoteRecord};
use crate::model::*;
use crate::repo::{BlobContent, CommitScope, Repo};
use chrono::{DateTime, FixedOffset};
use git2::Oid;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use std::collections::HashMap;
use std::path::{Component, Path};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct NavData {
    pub commit: Option<Oid>,
    pub branch: Option<String>,
}

/// Identity of a page: title, navigation context and links back to the site root
#[derive(Debug, Clone)]
pub struct BaseData {
    pub title: String,
    pub home: String,
    pub style_path: String,
    /// `../` prefix leading from the page's directory to the output root
    pub root: String,
    pub nav: NavData,
}

impl BaseData {
    /// `page` is the page's path relative to the output root.
    pub fn new(config: &Config, page: &Path, title: impl Into<String>, nav: NavData) -> Self {
        let root = relative_root(page);
        BaseData {
            title: title.into(),
            home: config.name.clone(),
            style_path: format!("{root}{}", config.style_path),
            root,
            nav,
        }
    }
}

/// The output root counts as one path segment, so `c/<hash>.html` is one level deep.
pub fn relative_root(page: &Path) -> String {
    let segments = 1 + page.components().filter(|c| matches!(c, Component::Normal(_))).count();
    "../".repeat(segments.saturating_sub(2))
}

/// Human readable byte count using SI prefixes
pub fn prettify_bytes(size: u64) -> String {
    const PREFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];
    if size == 0 {
        return "0 B".to_string();
    }
    let mut exp = 0;
    let mut scaled = size;
    while scaled >= 1000 && exp < PREFIXES.len() - 1 {
        scaled /= 1000;
        exp += 1;
    }
    format!("{:.1} {}B", size as f64 / 1000f64.powi(exp as i32), PREFIXES[exp])
}

/// Renders markdown with raw HTML demoted to text. Returns `None` for non-UTF-8 input.
pub fn markdown_to_html(source: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(source).ok()?;
    let events = Parser::new_ext(text, Options::all()).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        Event::Start(Tag::Link(kind, url, title)) if is_script_url(&url) => {
            Event::Start(Tag::Link(kind, CowStr::Borrowed("#"), title))
        }
        Event::Start(Tag::Image(kind, url, title)) if is_script_url(&url) => {
            Event::Start(Tag::Image(kind, CowStr::Borrowed("#"), title))
        }
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, events);
    Some(out)
}

fn is_script_url(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    url.starts_with("javascript:") || url.starts_with("vbscript:") || url.starts_with("data:")
}

fn render_markdown(content: &BlobContent, name: &str) -> Option<String> {
    let rendered = markdown_to_html(&content.data);
    if rendered.is_none() {
        warn!(file = name, "markdown is not valid UTF-8, leaving it unrendered");
    }
    rendered
}

#[derive(Debug, Clone)]
pub struct TreeFile {
    pub name: String,
    pub kind: EntryKind,
    pub size: String,
    /// External link, only set for submodules
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TreeData {
    pub readme: Option<String>,
    pub entries: Vec<TreeFile>,
    /// Directory the entry pages live in, relative to the page itself
    pub tree_name: String,
}

impl TreeData {
    /// `dir` is the tree's path from the branch root (empty for the root tree).
    pub fn from_tree(
        repo: &Repo,
        tree: Oid,
        dir: &str,
        submodules: &HashMap<String, String>,
        tree_name: &str,
    ) -> Result<Self> {
        let mut data = TreeData { tree_name: tree_name.to_string(), ..TreeData::default() };

        for entry in repo.tree_entries(tree)? {
            let mut size = String::new();
            let mut link = None;
            match entry.kind {
                EntryKind::Submodule => link = submodules.get(&join_path(dir, &entry.name)).cloned(),
                kind if kind.is_file() => {
                    let content = repo.blob(entry.id)?;
                    match entry.name.to_lowercase().as_str() {
                        "readme" if data.readme.is_none() => data.readme = render_markdown(&content, &entry.name),
                        "readme.md" => data.readme = render_markdown(&content, &entry.name),
                        _ => {}
                    }
                    size = if content.is_binary {
                        prettify_bytes(content.data.len() as u64)
                    } else {
                        format!("{}L", content.line_count())
                    };
                }
                // Directories, symlinks and unknown modes are listed without reading a blob.
                _ => {}
            }
            data.entries.push(TreeFile { name: entry.name, kind: entry.kind, size, link });
        }

        data.entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(data)
    }
}

pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlobData {
    pub lines: Vec<String>,
    pub is_binary: bool,
    pub size: u64,
    pub markdown: Option<String>,
}

impl BlobData {
    pub fn from_blob(repo: &Repo, id: Oid, name: &str) -> Result<Self> {
        Ok(Self::from_content(&repo.blob(id)?, name))
    }

    pub fn from_content(content: &BlobContent, name: &str) -> Self {
        let mut data = BlobData {
            is_binary: content.is_binary,
            size: content.data.len() as u64,
            ..BlobData::default()
        };
        if content.is_binary {
            return data;
        }

        data.lines = content.text().lines().map(str::to_string).collect();
        if name.to_lowercase().ends_with(".md") {
            data.markdown = render_markdown(content, name);
        }
        data
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub files: usize,
    pub additions: usize,
    pub deletions: usize,
}

impl LogStats {
    pub fn from_patches(patches: &[FilePatch]) -> Self {
        patches.iter().map(FilePatch::stat).fold(LogStats::default(), |mut acc, stat| {
            acc.files += 1;
            acc.additions += stat.additions;
            acc.deletions += stat.deletions;
            acc
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogCommit {
    pub id: Oid,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub subject: String,
    pub refs: Vec<ShortRef>,
    pub stats: LogStats,
}

#[derive(Debug, Clone, Default)]
pub struct LogData {
    pub commits: Vec<LogCommit>,
}

impl LogData {
    pub fn from_branch(repo: &Repo, tip: Oid, refs: &CommitRefIndex, limit: Option<usize>) -> Result<Self> {
        let mut data = LogData::default();
        for commit in repo.commits(CommitScope::Tip(tip), limit)? {
            let stats = LogStats::from_patches(&repo.diff(commit.id)?);
            data.commits.push(LogCommit {
                id: commit.id,
                author: commit.author.name.clone(),
                date: commit.author.date,
                subject: commit.subject().to_string(),
                refs: refs.get(&commit.id).to_vec(),
                stats,
            });
        }
        Ok(data)
    }
}

#[derive(Debug, Clone)]
pub struct CommitData {
    pub id: Oid,
    pub subject: String,
    pub message: String,
    pub author: Identity,
    pub committer: Identity,
    pub parents: Vec<Oid>,
    pub notes: Vec<NoteRecord>,
    pub stats: Vec<FileStat>,
    pub diff: Vec<DiffBlock>,
}

impl CommitData {
    pub fn from_commit(repo: &Repo, commit: &CommitInfo, notes: &[NoteRecord], formatter: &Formatter) -> Result<Self> {
        let patches = repo.diff(commit.id)?;
        Ok(CommitData {
            id: commit.id,
            subject: commit.subject().to_string(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            committer: commit.committer.clone(),
            parents: commit.parents.clone(),
            notes: notes.to_vec(),
            stats: patches.iter().map(FilePatch::stat).collect(),
            diff: formatter.format(&patches, None),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefsData {
    pub branches: Vec<String>,
    pub tags: Vec<TagRecord>,
}

impl RefsData {
    /// Tags end up newest first, ties broken by name.
    pub fn new(branches: Vec<String>, mut tags: Vec<TagRecord>) -> Self {
        tags.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        RefsData { branches, tags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn root_depth_follows_page_location() {
        assert_eq!(relative_root(Path::new("refs.html")), "");
        assert_eq!(relative_root(Path::new("c/0123.html")), "../");
        assert_eq!(relative_root(Path::new("main/index.html")), "../");
        assert_eq!(relative_root(Path::new("main/t/src/lib.rs.html")), "../../../");
    }

    #[test]
    fn style_path_is_relative_to_the_page() {
        let config = Config::new("repo", "demo");
        let base = BaseData::new(&config, Path::new("main/t/a.html"), "a", NavData::default());
        assert_eq!(base.style_path, "../../../static/styles.css");
        assert_eq!(base.home, "demo");
    }

    #[test]
    fn bytes_use_si_prefixes() {
        assert_eq!(prettify_bytes(0), "0 B");
        assert_eq!(prettify_bytes(999), "999.0 B");
        assert_eq!(prettify_bytes(1500), "1.5 kB");
        assert_eq!(prettify_bytes(2_000_000), "2.0 MB");
    }

    #[test]
    fn markdown_escapes_raw_html() {
        let html = markdown_to_html(b"# Title\n\n<script>alert(1)</script>\n\n[x](javascript:alert(1))\n").unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn markdown_rejects_invalid_utf8() {
        assert_eq!(markdown_to_html(&[0xff, 0xfe, b'#']), None);
    }

    #[test]
    fn blob_data_numbers_text_and_skips_binary() {
        let text = BlobContent { data: b"one\ntwo\n".to_vec(), is_binary: false };
        let data = BlobData::from_content(&text, "notes.txt");
        assert_eq!(data.lines, ["one", "two"]);
        assert_eq!(data.markdown, None);

        let binary = BlobContent { data: vec![0, 1, 2], is_binary: true };
        let data = BlobData::from_content(&binary, "image.png");
        assert!(data.lines.is_empty());
        assert_eq!(data.size, 3);
    }

    #[test]
    fn tags_sort_newest_first() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let tag = |name: &str, secs: i64| TagRecord {
            name: name.to_string(),
            target: Oid::zero(),
            annotated: false,
            subject: String::new(),
            tagger: String::new(),
            date: offset.timestamp_opt(secs, 0).unwrap(),
        };
        let refs = RefsData::new(vec![], vec![tag("old", 10), tag("b", 20), tag("a", 20)]);
        let names: Vec<_> = refs.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "old"]);
    }
}
