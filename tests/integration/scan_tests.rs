//! Discovery, ignore rules, hardlink collapsing and grouping criteria.

use dupelink::cache::HashCache;
use dupelink::duplicates::{ContentKey, DuplicateFinder, DuplicateGroup, FinderConfig, ScanSummary};
use dupelink::scanner::{
    Algorithm, IgnoreRules, Walker, WalkerConfig, CACHE_FILE_NAME, LOG_FILE_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn canonical_root(dir: &TempDir) -> PathBuf {
    fs::canonicalize(dir.path()).unwrap()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn relative_paths(root: &Path, config: WalkerConfig) -> Vec<String> {
    Walker::new(root, config)
        .walk()
        .unwrap()
        .files
        .into_iter()
        .map(|f| f.relative_path)
        .collect()
}

fn find(root: &Path, config: FinderConfig) -> (Vec<DuplicateGroup>, ScanSummary) {
    let cache_dir = TempDir::new().unwrap();
    let mut cache = HashCache::empty(root, cache_dir.path().join(CACHE_FILE_NAME));
    DuplicateFinder::new(config).find_duplicates(root, &mut cache).unwrap()
}

#[test]
fn test_walk_is_sorted_and_respects_recursion() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "b.txt", "b");
    write(&root, "a.txt", "a");
    write(&root, "sub/c.txt", "c");

    let flat = relative_paths(&root, WalkerConfig::new(false, IgnoreRules::default()));
    assert_eq!(flat, ["a.txt", "b.txt"]);

    let deep = relative_paths(&root, WalkerConfig::new(true, IgnoreRules::default()));
    assert_eq!(deep, ["a.txt", "b.txt", "sub/c.txt"]);
}

#[test]
fn test_ignore_suffixes_and_artifacts() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "keep.jpg", "1");
    write(&root, "scratch.tmp", "1");
    write(&root, "shortcut.lnk", "1");
    write(&root, LOG_FILE_NAME, "log");
    write(&root, CACHE_FILE_NAME, "path;size;time;type;hash\n");

    let discovery = Walker::new(&root, WalkerConfig::new(false, IgnoreRules::parse(".tmp,.lnk")))
        .walk()
        .unwrap();
    let names: Vec<&str> = discovery.files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(names, ["keep.jpg"]);
    assert_eq!(discovery.cache_files, [root.join(CACHE_FILE_NAME)]);
}

#[test]
fn test_empty_ignore_list_still_skips_artifacts() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "a.tmp", "1");
    write(&root, LOG_FILE_NAME, "1");

    let names = relative_paths(&root, WalkerConfig::new(false, IgnoreRules::parse("")));
    assert_eq!(names, ["a.tmp"]);
}

#[test]
fn test_missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = Walker::new(&dir.path().join("nope"), WalkerConfig::default()).walk();
    assert!(result.is_err());
}

#[test]
#[cfg(unix)]
fn test_symlink_token_excludes_links() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "target.txt", "payload");
    std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();

    let skipped = relative_paths(&root, WalkerConfig::new(false, IgnoreRules::parse("symlink")));
    assert_eq!(skipped, ["target.txt"]);

    let followed = relative_paths(&root, WalkerConfig::new(false, IgnoreRules::parse("")));
    assert_eq!(followed, ["link.txt", "target.txt"]);
}

#[test]
#[cfg(unix)]
fn test_followed_symlink_collapses_with_target() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "target.txt", "payload");
    std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();

    let config = FinderConfig::default()
        .with_walker_config(WalkerConfig::new(false, IgnoreRules::parse("")));
    let (groups, summary) = find(&root, config);
    assert!(groups.is_empty());
    assert_eq!(summary.hardlinks_dropped, 1);
}

#[test]
#[cfg(any(unix, windows))]
fn test_existing_hardlinks_are_never_grouped() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "a.txt", "shared bytes");
    fs::hard_link(root.join("a.txt"), root.join("a_link.txt")).unwrap();
    write(&root, "copy.txt", "shared bytes");

    let (groups, summary) = find(&root, FinderConfig::default());

    assert_eq!(summary.hardlinks_dropped, 1);
    assert_eq!(groups.len(), 1);
    let members: Vec<&str> = groups[0].files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(members, ["a.txt", "copy.txt"]);
}

#[test]
#[cfg(any(unix, windows))]
fn test_hardlink_pair_alone_is_not_a_group() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "a.txt", "bytes");
    fs::hard_link(root.join("a.txt"), root.join("b.txt")).unwrap();

    let (groups, summary) = find(&root, FinderConfig::default());
    assert!(groups.is_empty());
    assert_eq!(summary.cache_misses, 0);
}

#[test]
fn test_groups_follow_first_appearance() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "1.txt", "second");
    write(&root, "2.txt", "first!");
    write(&root, "3.txt", "second");
    write(&root, "4.txt", "first!");

    let (groups, summary) = find(&root, FinderConfig::default().with_io_threads(4));
    assert_eq!(summary.duplicate_groups, 2);
    let first: Vec<&str> = groups[0].files.iter().map(|f| f.relative_path.as_str()).collect();
    let second: Vec<&str> = groups[1].files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(first, ["1.txt", "3.txt"]);
    assert_eq!(second, ["2.txt", "4.txt"]);
}

#[test]
fn test_name_algorithm_groups_across_directories() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "one/report.pdf", "v1");
    write(&root, "two/report.pdf", "version two");
    write(&root, "two/other.pdf", "v1");

    let config = FinderConfig::default()
        .with_algorithm(Algorithm::Name)
        .with_walker_config(WalkerConfig::new(true, IgnoreRules::default()));
    let (groups, summary) = find(&root, config);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, ContentKey::Name("report.pdf".to_string()));
    assert_eq!(summary.cache_misses, 0);
}

#[test]
fn test_size_algorithm_ignores_content() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "a.txt", "aaaa");
    write(&root, "b.txt", "bbbb");
    write(&root, "c.txt", "ccccc");

    let (groups, _) = find(&root, FinderConfig::default().with_algorithm(Algorithm::Size));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, ContentKey::Size(4));
}

#[test]
fn test_size_window_filters_candidates() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "small1.txt", "x");
    write(&root, "small2.txt", "x");
    write(&root, "big1.txt", "0123456789");
    write(&root, "big2.txt", "0123456789");

    let config = FinderConfig::default().with_size_window(Some(5), None);
    let (groups, summary) = find(&root, config);

    assert_eq!(summary.filtered_by_size, 2);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].files[0].relative_path, "big1.txt");
}

#[test]
fn test_empty_files_form_a_group() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write(&root, "e1", "");
    write(&root, "e2", "");

    let (groups, _) = find(&root, FinderConfig::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].wasted_space(), 0);
}
