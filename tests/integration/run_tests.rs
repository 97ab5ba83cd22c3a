//! Whole runs through the command-line entry point.

use clap::Parser;
use dupelink::cli::Cli;
use dupelink::error::ExitCode;
use dupelink::run_app;
use dupelink::scanner::{CACHE_FILE_NAME, LOG_FILE_NAME};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(root: &Path, rel: &str, content: &[u8], mtime_secs: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

fn run(root: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["dupelink", "-q", "-t", "2"];
    argv.extend_from_slice(args);
    let root = root.to_string_lossy().into_owned();
    argv.push(&root);
    run_app(Cli::try_parse_from(argv)?)
}

#[test]
fn test_run_deletes_newer_copy() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", &[b'x'; 100], 1_000);
    write_file(dir.path(), "b.txt", &[b'x'; 100], 2_000);
    write_file(dir.path(), "c.txt", &[b'y'; 100], 3_000);

    let code = run(dir.path(), &["--keep", "oldest", "--mode", "delete", "-a", "md5"]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());
    assert!(dir.path().join("c.txt").exists());
    assert!(dir.path().join(CACHE_FILE_NAME).exists());
    assert!(dir.path().join(LOG_FILE_NAME).exists());
}

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", b"payload", 1_000);
    write_file(dir.path(), "sub/b.txt", b"payload", 2_000);

    let code = run(dir.path(), &["-r", "-d", "-k", "latest", "-m", "hardlink"]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"payload");
    assert_eq!(fs::read(dir.path().join("sub/b.txt")).unwrap(), b"payload");
    // Hashes are still worth keeping after a preview.
    let rows = fs::read_to_string(dir.path().join(CACHE_FILE_NAME)).unwrap();
    assert_eq!(rows.lines().count(), 3);
}

#[test]
fn test_no_duplicates_is_success() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", b"one", 1_000);
    write_file(dir.path(), "b.txt", b"three", 1_000);

    let code = run(dir.path(), &["-k", "first"]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_missing_keep_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", b"one", 1_000);

    let err = run(dir.path(), &["-m", "delete"]).unwrap_err();
    assert!(format!("{err:#}").contains("keep"));
    assert!(dir.path().join("a.txt").exists());
}

#[test]
fn test_inverted_size_window_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(run(dir.path(), &["-k", "first", "--min-size", "2MB", "--max-size", "1MB"]).is_err());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");
    assert!(run(&missing, &["-k", "first"]).is_err());
}

#[test]
fn test_unknown_values_are_rejected_by_parser() {
    assert!(Cli::try_parse_from(["dupelink", "-k", "newest", "."]).is_err());
    assert!(Cli::try_parse_from(["dupelink", "-k", "first", "-a", "blake3", "."]).is_err());
    assert!(Cli::try_parse_from(["dupelink", "-k", "first", "-m", "copy", "."]).is_err());
}

#[test]
fn test_config_file_supplies_keep_policy() {
    let dir = TempDir::new().unwrap();
    let conf_dir = TempDir::new().unwrap();
    let conf = conf_dir.path().join("dupelink.toml");
    fs::write(&conf, "keep = \"oldest\"\nmode = \"delete\"\n").unwrap();
    write_file(dir.path(), "a.txt", b"payload", 1_000);
    write_file(dir.path(), "b.txt", b"payload", 2_000);

    let conf_arg = conf.to_string_lossy().into_owned();
    let code = run(dir.path(), &["--config", &conf_arg]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_second_symlink_run_finds_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", b"payload", 1_000);
    write_file(dir.path(), "b.txt", b"payload", 2_000);

    assert_eq!(run(dir.path(), &["-k", "oldest"]).unwrap(), ExitCode::Success);
    let link = dir.path().join("b.txt");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());

    let rows_before = fs::read_to_string(dir.path().join(CACHE_FILE_NAME)).unwrap();
    assert_eq!(run(dir.path(), &["-k", "oldest"]).unwrap(), ExitCode::Success);
    let rows_after = fs::read_to_string(dir.path().join(CACHE_FILE_NAME)).unwrap();
    assert_eq!(rows_before, rows_after);
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
}
