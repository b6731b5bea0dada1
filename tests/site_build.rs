use git2::{ObjectType, Oid, Repository, Signature, Time};
use git_static::{run, Config, Error};
use std::fs;
use std::path::{Path, PathBuf};

const FIRST_TIME: i64 = 1_600_000_000;
const SECOND_TIME: i64 = 1_600_000_100;
const TAG_TIME: i64 = 1_600_000_500;

fn signature(secs: i64) -> Signature<'static> {
    Signature::new("Dev", "dev@example.com", &Time::new(secs, 0)).unwrap()
}

fn write_tree(repo: &Repository, lib: &str) -> Oid {
    let readme = repo.blob(b"# Demo\n\nA small project.\n").unwrap();
    let lib = repo.blob(lib.as_bytes()).unwrap();

    let mut src = repo.treebuilder(None).unwrap();
    src.insert("lib.rs", lib, 0o100644).unwrap();
    let src = src.write().unwrap();

    let mut root = repo.treebuilder(None).unwrap();
    root.insert("README.md", readme, 0o100644).unwrap();
    root.insert("src", src, 0o040000).unwrap();
    root.write().unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    repo_path: PathBuf,
    config: Config,
    first: Oid,
    second: Oid,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let repo_path = dir.path().join("repo");
    let repo = Repository::init(&repo_path).unwrap();

    let sig = signature(FIRST_TIME);
    let tree = repo.find_tree(write_tree(&repo, "fn a() {}\n")).unwrap();
    let first = repo
        .commit(Some("refs/heads/main"), &sig, &sig, "Initial commit\n", &tree, &[])
        .unwrap();

    let sig = signature(SECOND_TIME);
    let parent = repo.find_commit(first).unwrap();
    let tree = repo.find_tree(write_tree(&repo, "fn b() {}\n")).unwrap();
    let second = repo
        .commit(Some("refs/heads/main"), &sig, &sig, "Rename function\n\nLonger body.\n", &tree, &[&parent])
        .unwrap();

    let tag_sig = signature(TAG_TIME);
    repo.tag("v1.0", parent.as_object(), &tag_sig, "Release 1.0\n", false).unwrap();
    let head = repo.find_commit(second).unwrap();
    repo.tag_lightweight("light", head.as_object(), false).unwrap();
    repo.note(&sig, &sig, None, second, "Reviewed by QA\n", false).unwrap();

    let config = Config {
        output: dir.path().join("public"),
        jobs: 2,
        ..Config::new(&repo_path, "demo")
    };
    Fixture { _dir: dir, repo_path, config, first, second }
}

fn read(root: &Path, page: &str) -> String {
    fs::read_to_string(root.join(page)).unwrap_or_else(|err| panic!("{page}: {err}"))
}

#[test]
fn builds_every_page_kind() {
    let fx = fixture();
    let summary = run(&fx.config).unwrap();
    let out = &fx.config.output;

    for page in [
        format!("c/{}.html", fx.first),
        format!("c/{}.html", fx.second),
        "main/index.html".to_string(),
        "main/log.html".to_string(),
        "main/t/README.md.html".to_string(),
        "main/t/src.html".to_string(),
        "main/t/src/lib.rs.html".to_string(),
        "refs.html".to_string(),
    ] {
        assert!(out.join(&page).is_file(), "missing {page}");
    }
    assert_eq!(summary.written, 8);
    assert_eq!(summary.skipped, 0);
}

#[test]
fn commit_page_shows_diff_and_notes() {
    let fx = fixture();
    run(&fx.config).unwrap();

    let page = read(&fx.config.output, &format!("c/{}.html", fx.second));
    assert!(page.contains("<h1>Rename function</h1>"));
    assert!(page.contains("<span class=\"frag\">@@ -1 +1 @@</span>"));
    assert!(page.contains("<span class=\"old\">-fn a() {}\n</span><span class=\"new\">+fn b() {}\n</span>"));
    assert!(page.contains("Reviewed by QA"));
    assert!(page.contains(&format!("href=\"../c/{}.html\"", fx.first)));
}

#[test]
fn branch_pages_link_into_the_tree() {
    let fx = fixture();
    run(&fx.config).unwrap();
    let out = &fx.config.output;

    let index = read(out, "main/index.html");
    assert!(index.contains("<a href=\"t/src.html\">src</a>"));
    assert!(index.contains("<h1>Demo</h1>"));

    let dir = read(out, "main/t/src.html");
    assert!(dir.contains("<a href=\"src/lib.rs.html\">lib.rs</a>"));
    assert!(dir.contains("href=\"../../../static/styles.css\""));

    let log = read(out, "main/log.html");
    assert!(log.contains("<span class=\"tagType\">v1.0</span>"));
    assert!(log.contains("<span class=\"branchType\">main</span>"));
    assert!(log.find("Rename function").unwrap() < log.find("Initial commit").unwrap());
}

#[test]
fn refs_page_lists_newest_tag_first() {
    let fx = fixture();
    run(&fx.config).unwrap();

    let refs = read(&fx.config.output, "refs.html");
    assert!(refs.contains("<a href=\"main/index.html\">main</a>"));
    let annotated = refs.find(">v1.0</a>").unwrap();
    let lightweight = refs.find(">light</a>").unwrap();
    assert!(annotated < lightweight);
    assert!(refs.contains("Release 1.0"));
}

#[test]
fn second_run_rewrites_nothing() {
    let fx = fixture();
    let first = run(&fx.config).unwrap();
    let index = fx.config.output.join("main/index.html");
    let modified = fs::metadata(&index).unwrap().modified().unwrap();

    let second = run(&fx.config).unwrap();

    assert_eq!(second.written, 0);
    assert_eq!(second.skipped, first.written);
    assert_eq!(fs::metadata(&index).unwrap().modified().unwrap(), modified);
}

#[test]
fn log_limit_caps_the_log() {
    let mut fx = fixture();
    fx.config.log_limit = Some(1);
    run(&fx.config).unwrap();

    let log = read(&fx.config.output, "main/log.html");
    assert!(log.contains("Rename function"));
    assert!(!log.contains("Initial commit"));
}

#[test]
fn missing_repository_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config { output: dir.path().join("out"), ..Config::new(dir.path().join("absent"), "demo") };
    assert!(run(&config).is_err());
}

#[test]
fn missing_object_fails_the_build_before_later_phases() {
    let fx = fixture();
    let blob = Oid::hash_object(ObjectType::Blob, b"fn b() {}\n").unwrap().to_string();
    let object = fx.repo_path.join(".git/objects").join(&blob[..2]).join(&blob[2..]);
    fs::remove_file(&object).unwrap();

    let result = run(&fx.config);

    assert!(matches!(result, Err(Error::Git(_))), "unexpected result: {result:?}");
    assert!(!fx.config.output.join("refs.html").exists());
    assert!(!fx.config.output.join("main/index.html").exists());
}

#[test]
fn note_added_later_rebuilds_its_commit_page() {
    let fx = fixture();
    run(&fx.config).unwrap();

    let repo = Repository::open(&fx.repo_path).unwrap();
    let later = signature(chrono::Utc::now().timestamp() + 120);
    repo.note(&later, &later, Some("refs/notes/review"), fx.first, "Looks good\n", false)
        .unwrap();

    let summary = run(&fx.config).unwrap();

    assert_eq!(summary.written, 1);
    let page = read(&fx.config.output, &format!("c/{}.html", fx.first));
    assert!(page.contains("Looks good"));
    assert!(page.contains("refs/notes/review"));
}

#[test]
fn submodule_entries_link_to_their_remote() {
    let dir = tempfile::tempdir().unwrap();
    let repo_path = dir.path().join("repo");
    let repo = Repository::init(&repo_path).unwrap();
    let sig = signature(FIRST_TIME);

    let empty = repo.find_tree(repo.treebuilder(None).unwrap().write().unwrap()).unwrap();
    let vendored = repo.commit(None, &sig, &sig, "vendored\n", &empty, &[]).unwrap();

    let gitmodules = repo
        .blob(b"[submodule \"vendor\"]\n\tpath = vendor\n\tURL = https://example.com/v.git ; mirror\n")
        .unwrap();
    let mut root = repo.treebuilder(None).unwrap();
    root.insert(".gitmodules", gitmodules, 0o100644).unwrap();
    root.insert("vendor", vendored, 0o160000).unwrap();
    let tree = repo.find_tree(root.write().unwrap()).unwrap();
    let head = repo
        .commit(Some("refs/heads/main"), &sig, &sig, "Add vendor\n", &tree, &[])
        .unwrap();

    let config = Config { output: dir.path().join("public"), ..Config::new(&repo_path, "demo") };
    run(&config).unwrap();

    let index = read(&config.output, "main/index.html");
    assert!(index.contains("<a href=\"https://example.com/v.git\">vendor</a>"));
    assert!(!config.output.join("main/t/vendor.html").exists());
    let commit = read(&config.output, &format!("c/{head}.html"));
    assert!(commit.contains(&format!("+Subproject commit {vendored}")));
}
