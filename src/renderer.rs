// src/renderer.rs

//! HTML for every page kind. All repository text passes through `escape`.

use crate::model::{EntryKind, Identity};
use crate::pages::*;
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn layout(base: &BaseData, content: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{} - {}</title>", escape(&base.title), escape(&base.home));
    let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", escape(&base.style_path));
    html.push_str("</head>\n<body>\n<header>\n<nav>\n");
    let _ = writeln!(html, "<a class=\"home\" href=\"{}refs.html\">{}</a>", base.root, escape(&base.home));
    if let Some(branch) = &base.nav.branch {
        let branch = escape(branch);
        let _ = writeln!(html, "<a href=\"{}{branch}/index.html\">{branch}</a>", base.root);
        let _ = writeln!(html, "<a href=\"{}{branch}/log.html\">log</a>", base.root);
    }
    if let Some(commit) = &base.nav.commit {
        let _ = writeln!(html, "<a href=\"{}c/{commit}.html\">{:.7}</a>", base.root, commit.to_string());
    }
    let _ = writeln!(html, "<a href=\"{}refs.html\">refs</a>", base.root);
    html.push_str("</nav>\n</header>\n<main>\n");
    html.push_str(content);
    html.push_str("</main>\n<footer>generated by git-static</footer>\n</body>\n</html>\n");
    html
}

fn identity(label: &str, who: &Identity) -> String {
    format!(
        "<tr><th>{label}</th><td>{} &lt;{}&gt;</td><td>{}</td></tr>\n",
        escape(&who.name),
        escape(&who.email),
        date(&who.date)
    )
}

pub fn render_commit(base: &BaseData, commit: &CommitData) -> String {
    let mut content = String::new();
    let _ = writeln!(content, "<h1>{}</h1>", escape(&commit.subject));
    content.push_str("<table class=\"commit\">\n");
    let _ = writeln!(content, "<tr><th>commit</th><td colspan=\"2\">{}</td></tr>", commit.id);
    content.push_str(&identity("author", &commit.author));
    content.push_str(&identity("committer", &commit.committer));
    for parent in &commit.parents {
        let _ = writeln!(
            content,
            "<tr><th>parent</th><td colspan=\"2\"><a href=\"{}c/{parent}.html\">{parent}</a></td></tr>",
            base.root
        );
    }
    content.push_str("</table>\n");
    let _ = writeln!(content, "<pre class=\"message\">{}</pre>", escape(&commit.message));

    for note in &commit.notes {
        let _ = writeln!(
            content,
            "<section class=\"note\"><h2>Notes ({})</h2><p>{}</p>",
            escape(&note.source_ref),
            date(&note.time)
        );
        let _ = writeln!(content, "<pre>{}</pre></section>", escape(&note.blob.lines.join("\n")));
    }

    if !commit.stats.is_empty() {
        content.push_str("<table class=\"stats\">\n");
        for stat in &commit.stats {
            let _ = writeln!(
                content,
                "<tr><td>{}</td><td class=\"new\">+{}</td><td class=\"old\">-{}</td></tr>",
                escape(&stat.path),
                stat.additions,
                stat.deletions
            );
        }
        content.push_str("</table>\n");
    }

    content.push_str("<pre class=\"diff\">");
    for block in &commit.diff {
        let _ = write!(content, "<span class=\"{}\">{}</span>", block.role.label(), escape(&block.text));
    }
    content.push_str("</pre>\n");

    layout(base, &content)
}

fn tree_table(tree: &TreeData) -> String {
    let mut content = String::from("<table class=\"tree\">\n");
    for entry in &tree.entries {
        let name = escape(&entry.name);
        let cell = match (entry.kind, &entry.link) {
            (EntryKind::Submodule, Some(url)) => format!("<a href=\"{}\">{name}</a>", escape(url)),
            (EntryKind::Submodule, None) => name.clone(),
            _ => format!("<a href=\"{}/{name}.html\">{name}</a>", escape(&tree.tree_name)),
        };
        let _ = writeln!(
            content,
            "<tr class=\"{}\"><td>{}</td><td>{cell}</td><td>{}</td></tr>",
            entry.kind.label(),
            entry.kind.label(),
            escape(&entry.size)
        );
    }
    content.push_str("</table>\n");
    if let Some(readme) = &tree.readme {
        let _ = writeln!(content, "<article class=\"readme\">{readme}</article>");
    }
    content
}

/// Landing page of a branch
pub fn render_index(base: &BaseData, tree: &TreeData) -> String {
    let content = format!("<h1>{}</h1>\n{}", escape(&base.title), tree_table(tree));
    layout(base, &content)
}

/// Page for a subdirectory of a branch
pub fn render_tree(base: &BaseData, tree: &TreeData) -> String {
    let content = format!("<h1 class=\"path\">{}/</h1>\n{}", escape(&base.title), tree_table(tree));
    layout(base, &content)
}

pub fn render_blob(base: &BaseData, blob: &BlobData) -> String {
    let mut content = format!("<h1 class=\"path\">{}</h1>\n", escape(&base.title));
    if blob.is_binary {
        let _ = writeln!(content, "<p class=\"binary\">Binary file, {}</p>", prettify_bytes(blob.size));
        return layout(base, &content);
    }
    if let Some(markdown) = &blob.markdown {
        let _ = writeln!(content, "<article class=\"markdown\">{markdown}</article>");
    }
    content.push_str("<table class=\"blob\">\n");
    for (n, line) in blob.lines.iter().enumerate() {
        let n = n + 1;
        let _ = writeln!(
            content,
            "<tr id=\"L{n}\"><td class=\"num\"><a href=\"#L{n}\">{n}</a></td><td><pre>{}</pre></td></tr>",
            escape(line)
        );
    }
    content.push_str("</table>\n");
    layout(base, &content)
}

pub fn render_log(base: &BaseData, log: &LogData) -> String {
    let mut content = format!("<h1>{}</h1>\n<table class=\"log\">\n", escape(&base.title));
    content.push_str("<tr><th>date</th><th>message</th><th>author</th><th>files</th><th>+</th><th>-</th></tr>\n");
    for commit in &log.commits {
        let refs: String = commit
            .refs
            .iter()
            .map(|r| format!(" <span class=\"{}\">{}</span>", r.kind.label(), escape(&r.name)))
            .collect();
        let _ = writeln!(
            content,
            "<tr><td>{}</td><td><a href=\"{}c/{}.html\">{}</a>{refs}</td><td>{}</td><td>{}</td><td class=\"new\">+{}</td><td class=\"old\">-{}</td></tr>",
            date(&commit.date),
            base.root,
            commit.id,
            escape(&commit.subject),
            escape(&commit.author),
            commit.stats.files,
            commit.stats.additions,
            commit.stats.deletions
        );
    }
    content.push_str("</table>\n");
    layout(base, &content)
}

pub fn render_refs(base: &BaseData, refs: &RefsData) -> String {
    let mut content = String::from("<h1>Branches</h1>\n<ul class=\"branches\">\n");
    for branch in &refs.branches {
        let branch = escape(branch);
        let _ = writeln!(
            content,
            "<li><a href=\"{}{branch}/index.html\">{branch}</a> <a href=\"{}{branch}/log.html\">log</a></li>",
            base.root, base.root
        );
    }
    content.push_str("</ul>\n<h1>Tags</h1>\n<table class=\"tags\">\n");
    for tag in &refs.tags {
        let _ = writeln!(
            content,
            "<tr><td>{}</td><td><a href=\"{}c/{}.html\">{}</a></td><td>{}</td><td>{}</td></tr>",
            date(&tag.date),
            base.root,
            tag.target,
            escape(&tag.name),
            escape(&tag.subject),
            escape(&tag.tagger)
        );
    }
    content.push_str("</table>\n");
    layout(base, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{DiffBlock, DiffRole};
    use chrono::TimeZone;
    use git2::Oid;
    use std::path::Path;

    fn who() -> Identity {
        Identity {
            name: "A <dev>".into(),
            email: "dev@example.com".into(),
            date: FixedOffset::east_opt(3600).unwrap().timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn commit_page_links_stylesheet_and_tags_diff_roles() {
        let config = Config::new("repo", "demo");
        let id = Oid::from_bytes(&[7; 20]).unwrap();
        let base = BaseData::new(&config, Path::new("c/x.html"), id.to_string(), NavData::default());
        let commit = CommitData {
            id,
            subject: "Fix <thing>".into(),
            message: "Fix <thing>\n".into(),
            author: who(),
            committer: who(),
            parents: vec![Oid::from_bytes(&[8; 20]).unwrap()],
            notes: vec![],
            stats: vec![],
            diff: vec![
                DiffBlock { role: DiffRole::Fragment, text: "@@ -1 +1 @@".into() },
                DiffBlock { role: DiffRole::Added, text: "+<b>\n".into() },
            ],
        };

        let html = render_commit(&base, &commit);

        assert!(html.contains("<link rel=\"stylesheet\" href=\"../../static/styles.css\">"));
        assert!(html.contains("<h1>Fix &lt;thing&gt;</h1>"));
        assert!(html.contains("<span class=\"frag\">@@ -1 +1 @@</span><span class=\"new\">+&lt;b&gt;\n</span>"));
        assert!(html.contains("href=\"../c/0808080808080808080808080808080808080808.html\""));
        assert!(html.contains("1970-01-01 01:00:00 +0100"));
    }

    #[test]
    fn tree_links_point_into_the_tree_directory() {
        let config = Config::new("repo", "demo");
        let base = BaseData::new(
            &config,
            Path::new("main/index.html"),
            "main",
            NavData { commit: None, branch: Some("main".into()) },
        );
        let tree = TreeData {
            readme: Some("<p>hello</p>".into()),
            tree_name: "t".into(),
            entries: vec![
                TreeFile { name: "src".into(), kind: EntryKind::Dir, size: String::new(), link: None },
                TreeFile {
                    name: "vendor".into(),
                    kind: EntryKind::Submodule,
                    size: String::new(),
                    link: Some("https://example.com/v.git".into()),
                },
            ],
        };

        let html = render_index(&base, &tree);

        assert!(html.contains("<a href=\"t/src.html\">src</a>"));
        assert!(html.contains("<a href=\"https://example.com/v.git\">vendor</a>"));
        assert!(html.contains("<a href=\"../main/log.html\">log</a>"));
        assert!(html.contains("<article class=\"readme\"><p>hello</p></article>"));
    }

    #[test]
    fn blob_lines_are_numbered() {
        let config = Config::new("repo", "demo");
        let base = BaseData::new(&config, Path::new("main/t/a.txt.html"), "a.txt", NavData::default());
        let blob = BlobData { lines: vec!["x < y".into(), "z".into()], ..BlobData::default() };

        let html = render_blob(&base, &blob);

        assert!(html.contains("<tr id=\"L2\"><td class=\"num\"><a href=\"#L2\">2</a></td><td><pre>z</pre></td></tr>"));
        assert!(html.contains("<pre>x &lt; y</pre>"));
    }
}
