// src/diff.rs

//! Turns raw per-file chunk lists into unified-diff blocks tagged by role.

use crate::model::{Chunk, ChunkKind, DiffBlock, DiffRole, FileIdentity, FilePatch};
use git2::Oid;

pub const DEFAULT_CONTEXT_LINES: usize = 3;

const NO_NEWLINE: &str = "\\ No newline at end of file\n";

/// Collects blocks, merging each new block into the previous one when the roles match.
#[derive(Debug, Default)]
pub struct DiffBuilder {
    blocks: Vec<DiffBlock>,
}

impl DiffBuilder {
    pub fn push(&mut self, role: DiffRole, text: impl AsRef<str>) {
        let text = text.as_ref();
        match self.blocks.last_mut() {
            Some(last) if last.role == role => last.text.push_str(text),
            _ => self.blocks.push(DiffBlock { role, text: text.to_string() }),
        }
    }

    pub fn finish(self) -> Vec<DiffBlock> {
        self.blocks
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    context: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::new(DEFAULT_CONTEXT_LINES)
    }
}

impl Formatter {
    pub fn new(context: usize) -> Self {
        Formatter { context }
    }

    /// Renders a whole commit diff. `message` becomes a leading meta block when present.
    pub fn format(&self, patches: &[FilePatch], message: Option<&str>) -> Vec<DiffBlock> {
        let mut builder = DiffBuilder::default();

        if let Some(message) = message.filter(|m| !m.is_empty()) {
            if message.ends_with('\n') {
                builder.push(DiffRole::Meta, message);
            } else {
                builder.push(DiffRole::Meta, format!("{message}\n"));
            }
        }

        for patch in patches {
            let header = file_header(patch);
            if !header.is_empty() {
                builder.push(DiffRole::Meta, header);
            }
            if patch.is_binary || is_noop(patch) {
                continue;
            }
            for hunk in HunkScanner::new(&patch.chunks, self.context).scan() {
                hunk.render(&mut builder);
            }
        }

        builder.finish()
    }
}

fn is_noop(patch: &FilePatch) -> bool {
    matches!((&patch.old, &patch.new), (Some(from), Some(to)) if from.hash == to.hash)
}

fn short_hash(oid: &Oid) -> String {
    let mut hex = oid.to_string();
    hex.truncate(7);
    hex
}

fn push_path_lines(out: &mut String, from: &str, to: &str, is_binary: bool) {
    if is_binary {
        out.push_str(&format!("Binary files {from} and {to} differ\n"));
    } else {
        out.push_str(&format!("--- {from}\n+++ {to}\n"));
    }
}

fn file_header(patch: &FilePatch) -> String {
    let mut out = String::new();
    match (&patch.old, &patch.new) {
        (None, None) => {}
        (None, Some(to)) => {
            out.push_str(&format!("diff --git a/{0} b/{0}\n", to.path));
            out.push_str(&format!("new file mode {:o}\n", to.mode));
            out.push_str(&format!("index {}..{}\n", short_hash(&Oid::zero()), short_hash(&to.hash)));
            push_path_lines(&mut out, "/dev/null", &format!("b/{}", to.path), patch.is_binary);
        }
        (Some(from), None) => {
            out.push_str(&format!("diff --git a/{0} b/{0}\n", from.path));
            out.push_str(&format!("deleted file mode {:o}\n", from.mode));
            out.push_str(&format!("index {}..{}\n", short_hash(&from.hash), short_hash(&Oid::zero())));
            push_path_lines(&mut out, &format!("a/{}", from.path), "/dev/null", patch.is_binary);
        }
        (Some(from), Some(to)) => modified_header(&mut out, from, to, patch.is_binary),
    }
    out
}

fn modified_header(out: &mut String, from: &FileIdentity, to: &FileIdentity, is_binary: bool) {
    out.push_str(&format!("diff --git a/{} b/{}\n", from.path, to.path));
    if from.mode != to.mode {
        out.push_str(&format!("old mode {:o}\nnew mode {:o}\n", from.mode, to.mode));
    }
    if from.path != to.path {
        out.push_str(&format!("rename from {}\nrename to {}\n", from.path, to.path));
    }
    if from.hash != to.hash {
        out.push_str(&format!("index {}..{}", short_hash(&from.hash), short_hash(&to.hash)));
        if from.mode == to.mode {
            out.push_str(&format!(" {:o}", from.mode));
        }
        out.push('\n');
        push_path_lines(out, &format!("a/{}", from.path), &format!("b/{}", to.path), is_binary);
    }
}

/// Splits text into lines, keeping terminators. A trailing unterminated line is kept.
fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// A change region with its surrounding context.
#[derive(Debug, Clone)]
pub(crate) struct Hunk<'a> {
    pub from_start: usize,
    pub from_count: usize,
    pub to_start: usize,
    pub to_count: usize,
    pub context_prefix: &'a str,
    pub ops: Vec<(ChunkKind, &'a str)>,
}

impl<'a> Hunk<'a> {
    fn new(context_prefix: &'a str) -> Self {
        Hunk {
            from_start: 0,
            from_count: 0,
            to_start: 0,
            to_count: 0,
            context_prefix,
            ops: Vec::new(),
        }
    }

    fn push(&mut self, kind: ChunkKind, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            match kind {
                ChunkKind::Insert => self.to_count += 1,
                ChunkKind::Delete => self.from_count += 1,
                ChunkKind::Equal => {
                    self.from_count += 1;
                    self.to_count += 1;
                }
            }
            self.ops.push((kind, line));
        }
    }

    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            line_range(self.from_start, self.from_count),
            line_range(self.to_start, self.to_count)
        )
    }

    fn render(&self, out: &mut DiffBuilder) {
        out.push(DiffRole::Fragment, self.header());
        if self.context_prefix.is_empty() {
            out.push(DiffRole::Meta, "\n");
        } else {
            out.push(DiffRole::Meta, format!(" {}\n", self.context_prefix));
        }

        for &(kind, line) in &self.ops {
            let (role, marker) = match kind {
                ChunkKind::Equal => (DiffRole::Context, ' '),
                ChunkKind::Delete => (DiffRole::Removed, '-'),
                ChunkKind::Insert => (DiffRole::Added, '+'),
            };
            let mut text = String::with_capacity(line.len() + 2);
            text.push(marker);
            text.push_str(line);
            if line.ends_with('\n') {
                out.push(role, text);
            } else {
                text.push('\n');
                out.push(role, text);
                out.push(DiffRole::Meta, NO_NEWLINE);
            }
        }
    }
}

fn line_range(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

/// Single pass over one file's chunks. All scan state lives here.
///
/// `before_context` holds equal lines seen while no hunk is open; `after_context`
/// holds equal lines following the open hunk's last change. Line counters are
/// 1-based positions of the last line consumed on each side.
struct HunkScanner<'a> {
    chunks: &'a [Chunk],
    context: usize,
    from_line: usize,
    to_line: usize,
    current: Option<Hunk<'a>>,
    hunks: Vec<Hunk<'a>>,
    before_context: Vec<&'a str>,
    after_context: Vec<&'a str>,
}

impl<'a> HunkScanner<'a> {
    fn new(chunks: &'a [Chunk], context: usize) -> Self {
        HunkScanner {
            chunks,
            context,
            from_line: 0,
            to_line: 0,
            current: None,
            hunks: Vec::new(),
            before_context: Vec::new(),
            after_context: Vec::new(),
        }
    }

    fn is_last(&self, i: usize) -> bool {
        i + 1 == self.chunks.len()
    }

    fn scan(mut self) -> Vec<Hunk<'a>> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            let lines = split_lines(&chunk.text);
            let n = lines.len();

            match chunk.kind {
                ChunkKind::Equal => {
                    self.from_line += n;
                    self.to_line += n;
                    self.process_equal(lines, i);
                }
                // Empty change chunks carry no lines and never open a hunk.
                ChunkKind::Delete if n > 0 => {
                    self.from_line += 1;
                    self.open_hunk(i, ChunkKind::Delete);
                    self.from_line += n - 1;
                    self.push_change(ChunkKind::Delete, lines);
                }
                ChunkKind::Insert if n > 0 => {
                    self.to_line += 1;
                    self.open_hunk(i, ChunkKind::Insert);
                    self.to_line += n - 1;
                    self.push_change(ChunkKind::Insert, lines);
                }
                ChunkKind::Delete | ChunkKind::Insert => {}
            }

            if self.is_last(i) {
                if let Some(hunk) = self.current.take() {
                    self.hunks.push(hunk);
                }
            }
        }
        self.hunks
    }

    fn push_change(&mut self, kind: ChunkKind, lines: Vec<&'a str>) {
        if let Some(hunk) = self.current.as_mut() {
            hunk.push(kind, lines);
        }
    }

    fn process_equal(&mut self, lines: Vec<&'a str>, i: usize) {
        let last = self.is_last(i);
        let Some(hunk) = self.current.as_mut() else {
            self.before_context.extend(lines);
            return;
        };

        self.after_context.extend(lines);
        if self.after_context.len() <= self.context * 2 && !last {
            hunk.push(ChunkKind::Equal, self.after_context.drain(..));
            return;
        }

        let keep = self.context.min(self.after_context.len());
        hunk.push(ChunkKind::Equal, self.after_context.drain(..keep));
        if let Some(closed) = self.current.take() {
            self.hunks.push(closed);
        }
        self.before_context = std::mem::take(&mut self.after_context);
    }

    fn open_hunk(&mut self, i: usize, kind: ChunkKind) {
        if self.current.is_some() {
            return;
        }

        let mut lines_before = self.before_context.len();
        let mut prefix = "";
        if lines_before > self.context {
            prefix = self.before_context[lines_before - self.context - 1];
            self.before_context.drain(..lines_before - self.context);
            lines_before = self.context;
        }

        let mut hunk = Hunk::new(prefix.strip_suffix('\n').unwrap_or(prefix));
        hunk.push(ChunkKind::Equal, self.before_context.drain(..));

        if kind == ChunkKind::Delete {
            hunk.from_start = self.from_line - lines_before;
            hunk.to_start = self.counterpart_start(self.to_line, lines_before, i, ChunkKind::Insert);
        } else {
            hunk.to_start = self.to_line - lines_before;
            hunk.from_start = self.counterpart_start(self.from_line, lines_before, i, ChunkKind::Delete);
        }

        self.current = Some(hunk);
    }

    /// Start line on the side the opening chunk does not touch.
    fn counterpart_start(&self, line: usize, lines_before: usize, i: usize, other: ChunkKind) -> usize {
        let next = self.chunks.get(i + 1).map(|chunk| chunk.kind);
        if lines_before != 0 && self.context != 0 {
            if line > self.context {
                line - self.context + 1
            } else {
                1
            }
        } else if self.context == 0 {
            match next {
                Some(kind) if kind == other => line + 1,
                _ => line,
            }
        } else {
            match next {
                Some(kind) if kind == other || kind == ChunkKind::Equal => line + 1,
                _ => 0,
            }
        }
    }
}
