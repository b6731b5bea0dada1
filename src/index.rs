// src/index.rs

//! Commit associations built once per run: which refs and which notes point at a commit.

use crate::error::Result;
use crate::model::{RefEntry, RefKind, ShortRef};
use crate::pages::BlobData;
use crate::repo::Repo;
use chrono::{DateTime, FixedOffset};
use git2::Oid;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct CommitRefIndex {
    refs: HashMap<Oid, Vec<ShortRef>>,
}

impl CommitRefIndex {
    /// Groups refs by the commit they resolve to. `dereference` maps an annotated
    /// tag object to its target and returns `None` for anything else.
    pub fn build<F>(entries: Vec<RefEntry>, mut dereference: F) -> Result<Self>
    where
        F: FnMut(Oid) -> Result<Option<Oid>>,
    {
        let mut refs: HashMap<Oid, Vec<ShortRef>> = HashMap::new();
        for entry in entries {
            if matches!(entry.short.kind, RefKind::Invalid | RefKind::Symbolic | RefKind::Note) {
                continue;
            }
            let Some(mut target) = entry.target else {
                continue;
            };
            if entry.short.kind == RefKind::Tag {
                if let Some(commit) = dereference(target)? {
                    target = commit;
                }
            }
            refs.entry(target).or_default().push(entry.short);
        }

        for names in refs.values_mut() {
            names.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(CommitRefIndex { refs })
    }

    pub fn from_repo(repo: &Repo) -> Result<Self> {
        Self::build(repo.refs()?, |id| repo.dereference_tag(id))
    }

    pub fn get(&self, commit: &Oid) -> &[ShortRef] {
        self.refs.get(commit).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// A note attached to a commit
#[derive(Debug, Clone)]
pub struct NoteRecord {
    /// Full name of the notes ref, e.g. `refs/notes/commits`
    pub source_ref: String,
    pub note_commit: Oid,
    pub time: DateTime<FixedOffset>,
    pub blob: BlobData,
}

#[derive(Debug, Default)]
pub struct NoteIndex {
    notes: HashMap<Oid, Vec<NoteRecord>>,
}

impl NoteIndex {
    pub fn insert(&mut self, subject: Oid, note: NoteRecord) {
        self.notes.entry(subject).or_default().push(note);
    }

    pub fn from_repo(repo: &Repo) -> Result<Self> {
        let mut index = NoteIndex::default();
        for entry in repo.notes()? {
            let blob = BlobData::from_blob(repo, entry.blob, &entry.subject.to_string())?;
            index.insert(
                entry.subject,
                NoteRecord {
                    source_ref: entry.source_ref,
                    note_commit: entry.note_commit,
                    time: entry.time,
                    blob,
                },
            );
        }
        Ok(index)
    }

    pub fn get(&self, commit: &Oid) -> &[NoteRecord] {
        self.notes.get(commit).map_or(&[], Vec::as_slice)
    }

    /// Most recent note time for a commit, if it has notes.
    pub fn latest_time(&self, commit: &Oid) -> Option<DateTime<FixedOffset>> {
        self.get(commit).iter().map(|note| note.time).max()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
