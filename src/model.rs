// src/model.rs

use chrono::{DateTime, FixedOffset};
use git2::Oid;

/// Classification of a run of lines between two file revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Equal,
    Insert,
    Delete,
}

/// A maximal run of lines with the same classification. `text` keeps line terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub text: String,
}

impl Chunk {
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Chunk { kind, text: text.into() }
    }
}

/// One side of a file change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub path: String,
    pub mode: u32,
    pub hash: Oid,
}

/// The raw change list for a single file. At most one side is absent.
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub old: Option<FileIdentity>,
    pub new: Option<FileIdentity>,
    pub is_binary: bool,
    pub chunks: Vec<Chunk>,
}

/// Per-file change statistics, counted in lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
}

impl FilePatch {
    pub fn path(&self) -> &str {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map_or("", |identity| identity.path.as_str())
    }

    pub fn stat(&self) -> FileStat {
        let mut stat = FileStat { path: self.path().to_string(), additions: 0, deletions: 0 };
        if self.is_binary {
            return stat;
        }
        for chunk in &self.chunks {
            let lines = chunk.text.lines().count();
            match chunk.kind {
                ChunkKind::Insert => stat.additions += lines,
                ChunkKind::Delete => stat.deletions += lines,
                ChunkKind::Equal => {}
            }
        }
        stat
    }
}

/// Role of a rendered piece of diff text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffRole {
    Context,
    Meta,
    Fragment,
    Removed,
    Added,
}

impl DiffRole {
    /// CSS class used by the renderer
    pub fn label(self) -> &'static str {
        match self {
            DiffRole::Context => "context",
            DiffRole::Meta => "meta",
            DiffRole::Fragment => "frag",
            DiffRole::Removed => "old",
            DiffRole::Added => "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    pub role: DiffRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Note,
    Remote,
    Tag,
    Symbolic,
    Invalid,
}

impl RefKind {
    pub fn label(self) -> &'static str {
        match self {
            RefKind::Branch => "branchType",
            RefKind::Note => "noteType",
            RefKind::Remote => "remoteType",
            RefKind::Tag => "tagType",
            RefKind::Symbolic => "symbolicType",
            RefKind::Invalid => "invalidType",
        }
    }
}

/// A reference name as shown next to a commit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortRef {
    pub name: String,
    pub kind: RefKind,
}

/// A reference as listed by the repository. `target` is `None` for symbolic refs.
#[derive(Debug, Clone)]
pub struct RefEntry {
    pub short: ShortRef,
    pub target: Option<Oid>,
}

#[derive(Debug, Clone)]
pub struct TagRecord {
    pub name: String,
    pub target: Oid,
    pub annotated: bool,
    pub subject: String,
    pub tagger: String,
    pub date: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub date: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Identity,
    pub committer: Identity,
    pub message: String,
}

impl CommitInfo {
    /// First paragraph of the message
    pub fn subject(&self) -> &str {
        subject_of(&self.message)
    }
}

pub fn subject_of(message: &str) -> &str {
    message.split("\n\n").next().unwrap_or("").trim_end()
}

#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    pub tip: Oid,
}

/// Tree entry classification, mirroring git's file modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Empty,
    Dir,
    Regular,
    Deprecated,
    Executable,
    Symlink,
    Submodule,
}

impl EntryKind {
    pub fn from_mode(mode: i32) -> Self {
        match mode {
            0o040000 => EntryKind::Dir,
            0o100644 => EntryKind::Regular,
            0o100664 => EntryKind::Deprecated,
            0o100755 => EntryKind::Executable,
            0o120000 => EntryKind::Symlink,
            0o160000 => EntryKind::Submodule,
            _ => EntryKind::Empty,
        }
    }

    /// Regular files, executable or not, whose blob holds file content
    pub fn is_file(self) -> bool {
        matches!(self, EntryKind::Regular | EntryKind::Deprecated | EntryKind::Executable)
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Empty => "empty",
            EntryKind::Dir => "dir",
            EntryKind::Regular => "file",
            EntryKind::Deprecated => "file",
            EntryKind::Executable => "exec",
            EntryKind::Symlink => "link",
            EntryKind::Submodule => "submodule",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeEntryInfo {
    pub name: String,
    pub id: Oid,
    pub kind: EntryKind,
}
