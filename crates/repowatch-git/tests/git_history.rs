use std::path::Path;

use git2::{Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use repowatch_core::{HistoryError, HistoryProvider, ProviderFactory, RepositoryConfig};
use repowatch_git::{GitHistory, GitProviderFactory};

fn init_upstream(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    Repository::init_opts(path, &opts).unwrap()
}

fn commit(repo: &Repository, message: &str) -> String {
    let sig = Signature::now("Ada", "ada@example.com").unwrap();
    let tree_id = {
        let mut index = repo.index().unwrap();
        index.write_tree().unwrap()
    };
    let tree = repo.find_tree(tree_id).unwrap();
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
        .to_string()
}

struct Fixture {
    _dir: TempDir,
    upstream: Repository,
    history: GitHistory,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let upstream_path = dir.path().join("upstream");
    let upstream = init_upstream(&upstream_path);
    let history = GitHistory::open(
        &dir.path().join("clone"),
        upstream_path.to_str().unwrap(),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        upstream,
        history,
    }
}

#[test]
fn test_tip_follows_upstream_after_refresh() {
    let f = fixture();
    commit(&f.upstream, "first");
    let second = commit(&f.upstream, "second");

    f.history.refresh().unwrap();
    let tip = f.history.tip("master").unwrap();
    assert_eq!(tip.id, second);
    assert_eq!(tip.short_id, second[..7]);
    assert_eq!(tip.author_name, "Ada");
    assert_eq!(tip.author_email, "ada@example.com");
    assert_eq!(tip.summary, "second");

    let third = commit(&f.upstream, "third");
    f.history.refresh().unwrap();
    assert_eq!(f.history.tip("master").unwrap().id, third);
}

#[test]
fn test_ancestry_is_newest_first_and_bounded() {
    let f = fixture();
    commit(&f.upstream, "one");
    commit(&f.upstream, "two");
    commit(&f.upstream, "three");
    f.history.refresh().unwrap();

    let walk = f.history.ancestry("master", 10).unwrap();
    let summaries: Vec<&str> = walk.iter().map(|c| c.summary.as_str()).collect();
    assert_eq!(summaries, vec!["three", "two", "one"]);

    let bounded = f.history.ancestry("master", 2).unwrap();
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].summary, "three");
}

#[test]
fn test_unknown_branch_is_reported() {
    let f = fixture();
    commit(&f.upstream, "only");
    f.history.refresh().unwrap();

    assert!(matches!(
        f.history.tip("no-such-branch"),
        Err(HistoryError::BranchNotFound(_))
    ));
}

#[test]
fn test_prefix_resolution() {
    let f = fixture();
    let id = commit(&f.upstream, "findable");
    f.history.refresh().unwrap();

    let hit = f.history.resolve_prefix(&id[..7]).unwrap().unwrap();
    assert_eq!(hit.id, id);
    assert_eq!(hit.summary, "findable");

    // Unknown but plausible prefix, too-short prefix, non-hex token.
    assert!(f.history.resolve_prefix("f00dfeed1234").unwrap().is_none());
    assert!(f.history.resolve_prefix("ab").unwrap().is_none());
    assert!(f.history.resolve_prefix("snarfing").unwrap().is_none());
}

#[test]
fn test_open_failure_surfaces_git_error() {
    let dir = TempDir::new().unwrap();
    // A plain file where the clone directory should go.
    let blocker = dir.path().join("clone");
    std::fs::write(&blocker, b"not a repository").unwrap();
    assert!(GitHistory::open(&blocker, "https://example.com/x.git").is_err());
}

#[test]
fn test_reopen_reuses_existing_clone() {
    let dir = TempDir::new().unwrap();
    let upstream_path = dir.path().join("upstream");
    let upstream = init_upstream(&upstream_path);
    commit(&upstream, "kept");
    let url = upstream_path.to_str().unwrap().to_string();
    let clone_path = dir.path().join("clone");

    {
        let history = GitHistory::open(&clone_path, &url).unwrap();
        history.refresh().unwrap();
        assert_eq!(history.tip("master").unwrap().summary, "kept");
    }

    // Second open sees the already-fetched refs without a new fetch.
    let reopened = GitHistory::open(&clone_path, &url).unwrap();
    assert_eq!(reopened.tip("master").unwrap().summary, "kept");
}

#[test]
fn test_factory_places_clones_by_short_name() {
    let dir = TempDir::new().unwrap();
    let upstream_path = dir.path().join("upstream");
    let upstream = init_upstream(&upstream_path);
    commit(&upstream, "base");

    let factory = GitProviderFactory::new(dir.path().join("clones"));
    let config = RepositoryConfig {
        name: "proto".to_string(),
        display_name: "Prototype".to_string(),
        url: upstream_path.to_str().unwrap().to_string(),
        branch: "master".to_string(),
        channels: vec!["#dev".to_string()],
        message_template: "[%s] %m".to_string(),
        reply_template: String::new(),
        link_template: String::new(),
    };
    let provider = factory.open(&config).unwrap();
    provider.refresh().unwrap();
    assert_eq!(provider.tip("master").unwrap().summary, "base");
    assert!(dir.path().join("clones").join("proto").exists());
}
