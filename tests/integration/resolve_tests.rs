//! Finder and resolver together on real trees.

use dupelink::actions::{
    KeepPolicy, LinkAction, Outcome, ResolutionReport, ResolveConfig, Resolver,
};
use dupelink::cache::HashCache;
use dupelink::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig};
use dupelink::scanner::{IgnoreRules, WalkerConfig, CACHE_FILE_NAME};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn canonical_root(dir: &TempDir) -> PathBuf {
    fs::canonicalize(dir.path()).unwrap()
}

fn write_file(root: &Path, rel: &str, content: &[u8], mtime_secs: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

fn scan(root: &Path, recursive: bool) -> Vec<DuplicateGroup> {
    let mut cache = HashCache::open(root).unwrap();
    let config = FinderConfig::default()
        .with_io_threads(2)
        .with_walker_config(WalkerConfig::new(recursive, IgnoreRules::default()));
    DuplicateFinder::new(config)
        .find_duplicates(root, &mut cache)
        .unwrap()
        .0
}

fn resolve(
    groups: Vec<DuplicateGroup>,
    policy: KeepPolicy,
    action: LinkAction,
    dry_run: bool,
) -> ResolutionReport {
    Resolver::new(ResolveConfig::new(policy, action).with_dry_run(dry_run)).resolve(groups)
}

#[test]
fn test_keep_oldest_delete_the_rest() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", &[b'x'; 100], 1_000);
    write_file(&root, "b.txt", &[b'x'; 100], 2_000);
    write_file(&root, "c.txt", &[b'y'; 100], 3_000);

    let groups = scan(&root, false);
    assert_eq!(groups.len(), 1);
    let report = resolve(groups, KeepPolicy::Oldest, LinkAction::Delete, false);

    assert_eq!(report.kept, 1);
    assert_eq!(report.applied, 1);
    assert!(root.join("a.txt").exists());
    assert!(!root.join("b.txt").exists());
    assert!(root.join("c.txt").exists());

    let rows = fs::read_to_string(root.join(CACHE_FILE_NAME)).unwrap();
    assert_eq!(rows.lines().count(), 4);
}

#[test]
fn test_keep_latest_selects_newest() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "old.txt", b"payload", 1_000);
    write_file(&root, "new.txt", b"payload", 9_000);
    write_file(&root, "mid.txt", b"payload", 5_000);

    let report = resolve(scan(&root, false), KeepPolicy::Latest, LinkAction::Delete, false);
    assert_eq!(report.applied, 2);
    assert!(root.join("new.txt").exists());
    assert!(!root.join("old.txt").exists());
    assert!(!root.join("mid.txt").exists());
}

#[test]
fn test_keep_highest_and_deepest() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "top.txt", b"payload", 1_000);
    write_file(&root, "nested/deeper/bottom.txt", b"payload", 1_000);

    let report = resolve(scan(&root, true), KeepPolicy::Highest, LinkAction::Delete, true);
    let kept: Vec<&PathBuf> = report
        .events
        .iter()
        .filter(|e| matches!(e.outcome, Outcome::Kept))
        .map(|e| &e.path)
        .collect();
    assert_eq!(kept, [&root.join("top.txt")]);

    let report = resolve(scan(&root, true), KeepPolicy::Deepest, LinkAction::Delete, true);
    let kept: Vec<&PathBuf> = report
        .events
        .iter()
        .filter(|e| matches!(e.outcome, Outcome::Kept))
        .map(|e| &e.path)
        .collect();
    assert_eq!(kept, [&root.join("nested/deeper/bottom.txt")]);
}

#[test]
fn test_first_and_last_follow_enumeration_order() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "1.txt", b"payload", 3_000);
    write_file(&root, "2.txt", b"payload", 1_000);
    write_file(&root, "3.txt", b"payload", 2_000);

    let report = resolve(scan(&root, false), KeepPolicy::Last, LinkAction::Delete, false);
    assert_eq!(report.applied, 2);
    assert!(root.join("3.txt").exists());

    write_file(&root, "4.txt", b"payload", 1_000);
    let report = resolve(scan(&root, false), KeepPolicy::First, LinkAction::Delete, false);
    assert_eq!(report.applied, 1);
    assert!(root.join("3.txt").exists());
    assert!(!root.join("4.txt").exists());
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"payload", 1_000);
    write_file(&root, "b.txt", b"payload", 2_000);

    let report = resolve(scan(&root, false), KeepPolicy::Oldest, LinkAction::Delete, true);
    assert_eq!(report.planned, 1);
    assert_eq!(report.applied, 0);
    assert!(root.join("a.txt").exists());
    assert!(root.join("b.txt").exists());
    assert_eq!(fs::read(root.join("b.txt")).unwrap(), b"payload");
}

#[test]
fn test_modified_member_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"group one", 1_000);
    write_file(&root, "b.txt", b"group one", 2_000);
    write_file(&root, "c.txt", b"group two!", 1_000);
    write_file(&root, "d.txt", b"group two!", 2_000);

    let groups = scan(&root, false);
    assert_eq!(groups.len(), 2);
    // Touched after the scan: must not be acted on.
    set_file_mtime(root.join("b.txt"), FileTime::from_unix_time(7_000, 0)).unwrap();

    let report = resolve(groups, KeepPolicy::Oldest, LinkAction::Delete, false);
    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 1);
    assert!(report.has_failures());
    assert!(root.join("b.txt").exists());
    assert!(!root.join("d.txt").exists());
}

#[test]
fn test_missing_survivor_blocks_links() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"payload", 1_000);
    write_file(&root, "b.txt", b"payload", 2_000);

    let groups = scan(&root, false);
    fs::remove_file(root.join("a.txt")).unwrap();

    let report = resolve(groups, KeepPolicy::Oldest, LinkAction::Hardlink, false);
    assert_eq!(report.failed, 1);
    assert_eq!(fs::read(root.join("b.txt")).unwrap(), b"payload");
}

#[test]
#[cfg(unix)]
fn test_hardlink_mode_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"payload", 1_000);
    write_file(&root, "sub/b.txt", b"payload", 2_000);
    write_file(&root, "sub/c.txt", b"payload", 3_000);

    let report = resolve(scan(&root, true), KeepPolicy::Oldest, LinkAction::Hardlink, false);
    assert_eq!(report.applied, 2);

    assert!(scan(&root, true).is_empty());
}

#[test]
#[cfg(unix)]
fn test_symlink_mode_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"payload", 1_000);
    write_file(&root, "b.txt", b"payload", 2_000);

    let report = resolve(scan(&root, false), KeepPolicy::Oldest, LinkAction::Symlink, false);
    assert_eq!(report.applied, 1);
    assert_eq!(fs::read_link(root.join("b.txt")).unwrap(), root.join("a.txt"));

    assert!(scan(&root, false).is_empty());
}

#[test]
fn test_groups_are_independent() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    for (name, content) in [("a1", "AAAA"), ("a2", "AAAA"), ("b1", "BBBBB"), ("b2", "BBBBB")] {
        write_file(&root, name, content.as_bytes(), 1_000);
    }

    let report = resolve(scan(&root, false), KeepPolicy::First, LinkAction::Delete, false);
    assert_eq!(report.groups, 2);
    assert_eq!(report.kept, 2);
    let groups: Vec<usize> = report.events.iter().map(|e| e.group).collect();
    assert_eq!(groups, [0, 0, 1, 1]);
    assert!(root.join("a1").exists());
    assert!(root.join("b1").exists());
}
