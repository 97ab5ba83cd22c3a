//! Hash cache persistence across runs.

use dupelink::cache::{CacheEntry, CacheKey, HashCache};
use dupelink::duplicates::{DuplicateFinder, FinderConfig};
use dupelink::scanner::{
    Algorithm, FileRecord, Hasher, IgnoreRules, WalkerConfig, CACHE_FILE_NAME,
};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn canonical_root(dir: &TempDir) -> PathBuf {
    fs::canonicalize(dir.path()).unwrap()
}

fn write_file(root: &Path, name: &str, content: &[u8], mtime_secs: i64) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
    path
}

fn finder(recursive: bool) -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_io_threads(2)
            .with_walker_config(WalkerConfig::new(recursive, IgnoreRules::default())),
    )
}

fn data_rows(root: &Path) -> Vec<String> {
    fs::read_to_string(root.join(CACHE_FILE_NAME))
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

fn record_for(root: &Path, name: &str) -> FileRecord {
    let path = root.join(name);
    let metadata = fs::metadata(&path).unwrap();
    FileRecord::from_metadata(root, path, &metadata)
}

#[test]
fn test_first_run_records_every_hashed_file() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", &[b'x'; 100], 1_000);
    write_file(&root, "b.txt", &[b'x'; 100], 2_000);
    write_file(&root, "c.txt", &[b'y'; 100], 3_000);
    write_file(&root, "lonely.txt", &[b'z'; 7], 4_000);

    let mut cache = HashCache::open(&root).unwrap();
    let (groups, summary) = finder(false).find_duplicates(&root, &mut cache).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_misses, 3);
    assert_eq!(summary.eliminated_by_size, 1);

    let content = fs::read_to_string(root.join(CACHE_FILE_NAME)).unwrap();
    assert!(content.starts_with("path;size;time;type;hash\n"));
    let rows = data_rows(&root);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|r| r.starts_with("a.txt;100;")));
    assert!(rows.iter().any(|r| r.starts_with("c.txt;100;")));
    assert!(rows.iter().all(|r| r.split(';').nth(3) == Some("md5")));
    assert!(!rows.iter().any(|r| r.starts_with("lonely.txt")));
}

#[test]
fn test_second_run_reads_nothing() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"same content", 1_000);
    write_file(&root, "b.txt", b"same content", 2_000);

    let mut cache = HashCache::open(&root).unwrap();
    finder(false).find_duplicates(&root, &mut cache).unwrap();

    let mut cache = HashCache::open(&root).unwrap();
    assert_eq!(cache.len(), 2);
    let (groups, summary) = finder(false).find_duplicates(&root, &mut cache).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 2);
    assert_eq!(summary.cache_misses, 0);
    assert_eq!(summary.bytes_hashed, 0);
    assert_eq!(data_rows(&root).len(), 2);
}

#[test]
fn test_changed_file_is_rehashed_and_old_row_goes_inert() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"same content", 1_000);
    write_file(&root, "b.txt", b"same content", 2_000);

    let mut cache = HashCache::open(&root).unwrap();
    finder(false).find_duplicates(&root, &mut cache).unwrap();

    // Same size, new content, new mtime.
    write_file(&root, "b.txt", b"diff content", 5_000);

    let mut cache = HashCache::open(&root).unwrap();
    let (groups, summary) = finder(false).find_duplicates(&root, &mut cache).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.cache_misses, 1);

    let rows = data_rows(&root);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.starts_with("b.txt;")).count(), 2);
}

#[test]
fn test_resized_file_misses_cache() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"abc", 1_000);
    write_file(&root, "b.txt", b"abc", 1_000);

    let mut cache = HashCache::open(&root).unwrap();
    finder(false).find_duplicates(&root, &mut cache).unwrap();

    // Same mtime, different size: the key still changes.
    write_file(&root, "a.txt", b"abcd", 1_000);
    write_file(&root, "b.txt", b"abcd", 1_000);

    let mut cache = HashCache::open(&root).unwrap();
    let (groups, summary) = finder(false).find_duplicates(&root, &mut cache).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.cache_misses, 2);
}

#[test]
fn test_damaged_rows_are_rejected_individually() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"alpha", 1_000);
    write_file(&root, "b.txt", b"bravo", 1_000);

    let a = record_for(&root, "a.txt");
    let a_hash = Hasher::new()
        .hash_file(&a.full_path, Algorithm::Md5)
        .unwrap();
    let good = CacheEntry::new(CacheKey::for_record(&a, Algorithm::Md5), a_hash.clone())
        .fields()
        .join(";");

    let content = format!(
        "path;size;time;type;hash\n\
         {good}\n\
         a.txt;5;{t};md5\n\
         a.txt;5;{t};md5;nothex\n\
         gone.txt;5;{t};md5;{a_hash}\n\
         a.txt;5;{t};md5;{a_hash};extra\n\
         b.t",
        t = a.modified
    );
    fs::write(root.join(CACHE_FILE_NAME), content).unwrap();

    let cache = HashCache::open(&root).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.report().rejected, 5);
    assert_eq!(
        cache.get(&CacheKey::for_record(&a, Algorithm::Md5)),
        Some(a_hash.as_str())
    );

    // The partial last row must not swallow the next append.
    let b = record_for(&root, "b.txt");
    let b_key = CacheKey::for_record(&b, Algorithm::Md5);
    cache
        .record(&CacheEntry::new(b_key.clone(), "c4ca4238a0b923820dcc509a6f75849b"))
        .unwrap();

    let reopened = HashCache::open(&root).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get(&b_key), Some("c4ca4238a0b923820dcc509a6f75849b"));
}

#[test]
fn test_rows_for_other_algorithm_do_not_match() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    write_file(&root, "a.txt", b"same", 1_000);
    write_file(&root, "b.txt", b"same", 1_000);

    let mut cache = HashCache::open(&root).unwrap();
    finder(false).find_duplicates(&root, &mut cache).unwrap();

    let sha = DuplicateFinder::new(
        FinderConfig::default()
            .with_io_threads(1)
            .with_algorithm(Algorithm::Sha256),
    );
    let mut cache = HashCache::open(&root).unwrap();
    let (groups, summary) = sha.find_duplicates(&root, &mut cache).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.cache_misses, 2);
    assert!(data_rows(&root).iter().any(|r| r.contains(";sha256;")));
}

#[test]
fn test_nested_cache_is_adopted_with_prefix() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    let sub = root.join("photos");
    write_file(&root, "photos/x.jpg", b"pixels", 1_000);
    write_file(&root, "photos/y.jpg", b"pixels", 2_000);

    let mut sub_cache = HashCache::open(&sub).unwrap();
    finder(true).find_duplicates(&sub, &mut sub_cache).unwrap();
    assert!(sub.join(CACHE_FILE_NAME).exists());
    assert!(!root.join(CACHE_FILE_NAME).exists());

    let mut cache = HashCache::open(&root).unwrap();
    let (groups, summary) = finder(true).find_duplicates(&root, &mut cache).unwrap();

    assert_eq!(summary.cache_files_adopted, 1);
    assert_eq!(summary.cache_hits, 2);
    assert_eq!(summary.cache_misses, 0);
    assert_eq!(groups.len(), 1);
    let rels: Vec<&str> = groups[0]
        .files
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    assert_eq!(rels, ["photos/x.jpg", "photos/y.jpg"]);
}

#[test]
fn test_concurrent_appends_stay_row_atomic() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    let records: Vec<FileRecord> = (0..64)
        .map(|i| {
            write_file(&root, &format!("f{i:02}.bin"), format!("{i}").as_bytes(), 1_000);
            record_for(&root, &format!("f{i:02}.bin"))
        })
        .collect();

    let cache = HashCache::open(&root).unwrap();
    std::thread::scope(|scope| {
        for chunk in records.chunks(8) {
            let cache = &cache;
            scope.spawn(move || {
                for record in chunk {
                    let entry = CacheEntry::new(
                        CacheKey::for_record(record, Algorithm::Crc32),
                        format!("{:08x}", record.size),
                    );
                    cache.record(&entry).unwrap();
                }
            });
        }
    });

    let reopened = HashCache::open(&root).unwrap();
    assert_eq!(reopened.len(), 64);
    assert_eq!(reopened.report().rejected, 0);
}
