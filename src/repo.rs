// src/repo.rs

//! Read-only access to the repository. This is the only module that talks to git2.

use crate::error::{Error, Result};
use crate::model::*;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::{
    BranchType, Config, DiffFindOptions, DiffOptions, ErrorCode, ObjectType, Oid, Reference, ReferenceType,
    Repository, Sort, TreeWalkMode, TreeWalkResult,
};
use similar::{DiffTag, TextDiff};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const SUBMODULE_MODE: u32 = 0o160000;

/// Which commits a history walk starts from
#[derive(Debug, Clone, Copy)]
pub enum CommitScope {
    /// Every branch, tag and remote-tracking ref
    All,
    Tip(Oid),
}

/// A note blob and the commit it annotates
#[derive(Debug, Clone)]
pub struct NoteEntry {
    pub subject: Oid,
    pub source_ref: String,
    pub note_commit: Oid,
    pub time: DateTime<FixedOffset>,
    pub blob: Oid,
}

#[derive(Debug, Clone)]
pub struct BlobContent {
    pub data: Vec<u8>,
    pub is_binary: bool,
}

impl BlobContent {
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn line_count(&self) -> usize {
        self.text().lines().count()
    }
}

pub struct Repo {
    inner: Repository,
}

impl Repo {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Repo { inner: Repository::open(path)? })
    }

    /// Commits in committer-time order, newest first.
    pub fn commits(&self, scope: CommitScope, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        let mut revwalk = self.inner.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        match scope {
            CommitScope::All => {
                revwalk.push_glob("refs/heads")?;
                revwalk.push_glob("refs/tags")?;
                revwalk.push_glob("refs/remotes")?;
            }
            CommitScope::Tip(id) => revwalk.push(id)?,
        }

        revwalk
            .take(limit.unwrap_or(usize::MAX))
            .map(|oid| self.commit(oid?))
            .collect()
    }

    pub fn commit(&self, id: Oid) -> Result<CommitInfo> {
        let commit = self.inner.find_commit(id)?;
        let info = CommitInfo {
            id,
            tree: commit.tree_id(),
            parents: commit.parent_ids().collect(),
            author: identity(&commit.author()),
            committer: identity(&commit.committer()),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        };
        Ok(info)
    }

    /// Changes introduced by a commit relative to its first parent.
    pub fn diff(&self, id: Oid) -> Result<Vec<FilePatch>> {
        let commit = self.inner.find_commit(id)?;
        // TODO: merges only show the change against the first parent; a combined diff would cover all of them
        let parent_tree = match commit.parents().next() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };
        let tree = commit.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_typechange(true);
        let mut diff = self.inner.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        diff.deltas().map(|delta| self.file_patch(&delta)).collect()
    }

    fn file_patch(&self, delta: &git2::DiffDelta<'_>) -> Result<FilePatch> {
        let old = side(&delta.old_file());
        let new = side(&delta.new_file());

        let old_content = self.side_content(old.as_ref())?;
        let new_content = self.side_content(new.as_ref())?;
        let is_binary = old_content.is_binary || new_content.is_binary;

        let chunks = if is_binary {
            Vec::new()
        } else {
            chunks(&old_content.text(), &new_content.text())
        };

        Ok(FilePatch { old, new, is_binary, chunks })
    }

    fn side_content(&self, identity: Option<&FileIdentity>) -> Result<BlobContent> {
        match identity {
            None => Ok(BlobContent { data: Vec::new(), is_binary: false }),
            Some(identity) if identity.mode == SUBMODULE_MODE => Ok(BlobContent {
                data: format!("Subproject commit {}\n", identity.hash).into_bytes(),
                is_binary: false,
            }),
            Some(identity) => self.blob(identity.hash),
        }
    }

    pub fn blob(&self, id: Oid) -> Result<BlobContent> {
        let blob = self.inner.find_blob(id)?;
        Ok(BlobContent { data: blob.content().to_vec(), is_binary: blob.is_binary() })
    }

    pub fn refs(&self) -> Result<Vec<RefEntry>> {
        let mut entries = Vec::new();
        for reference in self.inner.references()? {
            let reference = reference?;
            let kind = ref_kind(&reference);
            let name = match kind {
                RefKind::Invalid => String::new(),
                _ => reference.shorthand().unwrap_or_default().to_string(),
            };
            entries.push(RefEntry { short: ShortRef { name, kind }, target: reference.target() });
        }
        Ok(entries)
    }

    /// Target of an annotated tag object, or `None` when `id` is not a tag object.
    pub fn dereference_tag(&self, id: Oid) -> Result<Option<Oid>> {
        match self.inner.find_tag(id) {
            Ok(tag) => Ok(Some(tag.target_id())),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn branches(&self) -> Result<Vec<BranchInfo>> {
        let mut branches = Vec::new();
        for branch in self.inner.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let Some(name) = branch.name()? else {
                continue;
            };
            let tip = branch.get().peel_to_commit()?.id();
            branches.push(BranchInfo { name: name.to_string(), tip });
        }
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    pub fn tags(&self) -> Result<Vec<TagRecord>> {
        let mut tags = Vec::new();
        for reference in self.inner.references_glob("refs/tags/*")? {
            let reference = reference?;
            let Some(id) = reference.target() else {
                continue;
            };
            let name = reference.shorthand().unwrap_or_default().to_string();

            let record = match self.inner.find_tag(id) {
                Ok(tag) => TagRecord {
                    name,
                    target: tag.target_id(),
                    annotated: true,
                    subject: subject_of(&String::from_utf8_lossy(tag.message_bytes().unwrap_or_default()))
                        .to_string(),
                    tagger: tag.tagger().map(|sig| identity(&sig).name).unwrap_or_default(),
                    date: tag.tagger().map(|sig| to_datetime(sig.when())).unwrap_or_default(),
                },
                Err(err) if err.code() == ErrorCode::NotFound => {
                    // Lightweight tags borrow their metadata from the commit they name.
                    let (tagger, date) = match self.inner.find_commit(id) {
                        Ok(commit) => {
                            let author = identity(&commit.author());
                            (author.name, to_datetime(commit.committer().when()))
                        }
                        Err(err) if err.code() == ErrorCode::NotFound => (String::new(), DateTime::default()),
                        Err(err) => return Err(err.into()),
                    };
                    TagRecord { name, target: id, annotated: false, subject: String::new(), tagger, date }
                }
                Err(err) => return Err(err.into()),
            };
            tags.push(record);
        }
        Ok(tags)
    }

    /// Every note under `refs/notes/`, keyed by the commit it is attached to.
    pub fn notes(&self) -> Result<Vec<NoteEntry>> {
        let mut notes = Vec::new();
        for reference in self.inner.references_glob("refs/notes/*")? {
            let reference = reference?;
            let source_ref = reference.name().unwrap_or_default().to_string();
            let commit = reference.peel_to_commit()?;
            let time = to_datetime(commit.committer().when());

            let mut blobs = Vec::new();
            commit.tree()?.walk(TreeWalkMode::PreOrder, |dir, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    // Fan-out directories split the subject hash across path segments.
                    let name = format!("{dir}{}", entry.name().unwrap_or_default()).replace('/', "");
                    blobs.push((name, entry.id()));
                }
                TreeWalkResult::Ok
            })?;

            for (name, blob) in blobs {
                if name.len() != 40 {
                    continue;
                }
                let Ok(subject) = Oid::from_str(&name) else {
                    continue;
                };
                notes.push(NoteEntry {
                    subject,
                    source_ref: source_ref.clone(),
                    note_commit: commit.id(),
                    time,
                    blob,
                });
            }
        }
        Ok(notes)
    }

    /// Direct children of a tree, in tree order.
    pub fn tree_entries(&self, tree: Oid) -> Result<Vec<TreeEntryInfo>> {
        let tree = self.inner.find_tree(tree)?;
        Ok(tree.iter().map(|entry| entry_info(&entry)).collect())
    }

    /// Every entry below a tree, directories before their contents. Paths use `/`.
    pub fn walk_tree(&self, tree: Oid) -> Result<Vec<(String, TreeEntryInfo)>> {
        let tree = self.inner.find_tree(tree)?;
        let mut entries = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            let info = entry_info(entry);
            entries.push((format!("{dir}{}", info.name), info));
            TreeWalkResult::Ok
        })?;
        Ok(entries)
    }

    /// Submodule path to remote URL, read from `.gitmodules` at the root of `tree`.
    pub fn submodules(&self, tree: Oid) -> Result<HashMap<String, String>> {
        let tree = self.inner.find_tree(tree)?;
        let Some(entry) = tree.get_name(".gitmodules") else {
            return Ok(HashMap::new());
        };
        if EntryKind::from_mode(entry.filemode()) == EntryKind::Symlink {
            return Err(Error::Submodules(".gitmodules is a symlink".to_string()));
        }
        let blob = self.inner.find_blob(entry.id())?;
        parse_gitmodules(blob.content())
    }
}

fn identity(signature: &git2::Signature<'_>) -> Identity {
    Identity {
        name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
        date: to_datetime(signature.when()),
    }
}

pub(crate) fn to_datetime(time: git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    offset.timestamp_opt(time.seconds(), 0).single().unwrap_or_default()
}

fn side(file: &git2::DiffFile<'_>) -> Option<FileIdentity> {
    if !file.exists() {
        return None;
    }
    Some(FileIdentity {
        path: file.path().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
        mode: u32::from(file.mode()),
        hash: file.id(),
    })
}

fn entry_info(entry: &git2::TreeEntry<'_>) -> TreeEntryInfo {
    TreeEntryInfo {
        name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
        id: entry.id(),
        kind: EntryKind::from_mode(entry.filemode()),
    }
}

fn ref_kind(reference: &Reference<'_>) -> RefKind {
    if reference.is_branch() {
        RefKind::Branch
    } else if reference.is_note() {
        RefKind::Note
    } else if reference.is_remote() {
        RefKind::Remote
    } else if reference.is_tag() {
        RefKind::Tag
    } else if reference.kind() == Some(ReferenceType::Symbolic) {
        RefKind::Symbolic
    } else {
        RefKind::Invalid
    }
}

/// Line-level chunks between two texts. Replacements become a delete followed by an insert.
pub fn chunks(old: &str, new: &str) -> Vec<Chunk> {
    let diff = TextDiff::from_lines(old, new);
    let mut chunks: Vec<Chunk> = Vec::new();

    let mut push = |kind: ChunkKind, text: String| match chunks.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(&text),
        _ => chunks.push(Chunk { kind, text }),
    };

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_text = || diff.old_slices()[old_range.clone()].concat();
        let new_text = || diff.new_slices()[new_range.clone()].concat();
        match tag {
            DiffTag::Equal => push(ChunkKind::Equal, old_text()),
            DiffTag::Delete => push(ChunkKind::Delete, old_text()),
            DiffTag::Insert => push(ChunkKind::Insert, new_text()),
            DiffTag::Replace => {
                push(ChunkKind::Delete, old_text());
                push(ChunkKind::Insert, new_text());
            }
        }
    }
    chunks
}

/// Submodule path to URL from the contents of a `.gitmodules` file. The bytes go through
/// libgit2's config parser, so key case, quoting and inline comments follow git.
pub fn parse_gitmodules(data: &[u8]) -> Result<HashMap<String, String>> {
    let mut file = NamedTempFile::new().map_err(|err| Error::io(std::env::temp_dir(), err))?;
    file.write_all(data).map_err(|err| Error::io(file.path(), err))?;
    let config = Config::open(file.path()).map_err(|err| Error::Submodules(err.message().to_string()))?;

    let mut paths: HashMap<String, String> = HashMap::new();
    let mut urls: HashMap<String, String> = HashMap::new();
    let mut entries = config
        .entries(Some(r"^submodule\..*\.(path|url)$"))
        .map_err(|err| Error::Submodules(err.message().to_string()))?;
    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|err| Error::Submodules(err.message().to_string()))?;
        let (Some(name), Some(value)) = (entry.name(), entry.value()) else {
            continue;
        };
        let Some((section, key)) = name.strip_prefix("submodule.").and_then(|rest| rest.rsplit_once('.')) else {
            continue;
        };
        match key {
            "path" => paths.insert(section.to_string(), value.to_string()),
            "url" => urls.insert(section.to_string(), value.to_string()),
            _ => None,
        };
    }

    Ok(paths
        .into_iter()
        .filter_map(|(section, path)| urls.remove(&section).map(|url| (path, url)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_becomes_delete_then_insert() {
        let chunks = chunks("a\nb\nc\n", "a\nB\nc\n");
        let kinds: Vec<_> = chunks.iter().map(|c| (c.kind, c.text.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (ChunkKind::Equal, "a\n"),
                (ChunkKind::Delete, "b\n"),
                (ChunkKind::Insert, "B\n"),
                (ChunkKind::Equal, "c\n"),
            ]
        );
    }

    #[test]
    fn new_text_is_a_single_insert() {
        let chunks = chunks("", "one\ntwo\n");
        assert_eq!(chunks, vec![Chunk::new(ChunkKind::Insert, "one\ntwo\n")]);
    }

    #[test]
    fn gitmodules_sections_map_path_to_url() {
        let text = r#"
[submodule "vendor/lib"]
	path = vendor/lib
	url = https://example.com/lib.git
# comment
[submodule "docs"]
	url = git@example.com:docs.git
	path = docs
[submodule "broken"]
	path = nowhere
"#;
        let mapping = parse_gitmodules(text.as_bytes()).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["vendor/lib"], "https://example.com/lib.git");
        assert_eq!(mapping["docs"], "git@example.com:docs.git");
    }

    #[test]
    fn gitmodules_follow_git_config_syntax() {
        let text = "[Submodule \"vendor\"]\n\tPath = vendor\n\tURL = https://example.com/v.git ; trailing comment\n\
                    [submodule \"quoted\"]\n\tpath = \"third party/q\"\n\turl = \"https://example.com/q.git\" # note\n";
        let mapping = parse_gitmodules(text.as_bytes()).unwrap();
        assert_eq!(mapping.get("vendor").map(String::as_str), Some("https://example.com/v.git"));
        assert_eq!(mapping.get("third party/q").map(String::as_str), Some("https://example.com/q.git"));
    }

    #[test]
    fn malformed_gitmodules_is_an_error() {
        assert!(matches!(parse_gitmodules(b"[submodule \"x\"\n\tpath = x\n"), Err(Error::Submodules(_))));
    }

    #[test]
    fn git_time_keeps_its_offset() {
        let date = to_datetime(git2::Time::new(1_600_000_000, 120));
        assert_eq!(date.timestamp(), 1_600_000_000);
        assert_eq!(date.offset().local_minus_utc(), 7200);
    }
}
