use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use filecommander_core::OperationKind;
use filecommander_diff::{
    DiffConfig, DiffType, DirectoryDiff, SyncAction, SyncDirection, compare, plan_sync,
};
use tempfile::TempDir;

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn write_at(path: &Path, contents: &[u8], time: SystemTime) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    set_mtime(path, time);
}

fn roots() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let left = temp.path().join("left");
    let right = temp.path().join("right");
    fs::create_dir(&left).unwrap();
    fs::create_dir(&right).unwrap();
    (temp, left, right)
}

#[test]
fn test_identical_trees() {
    let (_temp, left, right) = roots();
    let t = SystemTime::now() - Duration::from_secs(3600);
    for root in [&left, &right] {
        write_at(&root.join("a.txt"), b"same", t);
        write_at(&root.join("sub").join("b.txt"), b"also same", t);
    }

    let results = compare(&left, &right, true);
    let files: Vec<_> = results.iter().filter(|r| !r.is_dir).collect();

    assert_eq!(files.len(), 2);
    for entry in files {
        assert_eq!(entry.diff_type, DiffType::Identical);
        assert_eq!(entry.action, SyncAction::None);
    }
}

#[test]
fn test_left_only_produces_one_copy_job() {
    let (_temp, left, right) = roots();
    fs::write(left.join("a.txt"), b"only here").unwrap();

    let results = compare(&left, &right, true);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].relative_path, Path::new("a.txt"));
    assert_eq!(results[0].diff_type, DiffType::LeftOnly);
    assert_eq!(results[0].action, SyncAction::CopyLeftToRight);

    let jobs = plan_sync(&results, &left, &right, SyncDirection::Both);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].operation, OperationKind::Copy);
    assert_eq!(jobs[0].source, left.join("a.txt"));
    assert_eq!(jobs[0].destination, Some(right.join("a.txt")));
}

#[test]
fn test_newer_sides() {
    let (_temp, left, right) = roots();
    let old = SystemTime::now() - Duration::from_secs(7200);
    let new = SystemTime::now() - Duration::from_secs(60);

    write_at(&left.join("l.txt"), b"v2", new);
    write_at(&right.join("l.txt"), b"v1", old);
    write_at(&left.join("r.txt"), b"v1", old);
    write_at(&right.join("r.txt"), b"v2", new);

    let results = compare(&left, &right, false);
    let by_name = |name: &str| results.iter().find(|r| r.relative_path == Path::new(name)).unwrap();

    assert_eq!(by_name("l.txt").diff_type, DiffType::LeftNewer);
    assert_eq!(by_name("l.txt").action, SyncAction::CopyLeftToRight);
    assert_eq!(by_name("r.txt").diff_type, DiffType::RightNewer);
    assert_eq!(by_name("r.txt").action, SyncAction::CopyRightToLeft);
}

#[test]
fn test_same_time_different_size_is_conflict() {
    let (_temp, left, right) = roots();
    let t = SystemTime::now() - Duration::from_secs(600);
    write_at(&left.join("c.txt"), b"short", t);
    write_at(&right.join("c.txt"), b"much longer", t);

    let results = compare(&left, &right, true);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].diff_type, DiffType::Conflict);
    assert_eq!(results[0].action, SyncAction::Skip);
    assert!(plan_sync(&results, &left, &right, SyncDirection::Both).is_empty());
}

#[test]
fn test_non_recursive_stays_at_top_level() {
    let (_temp, left, right) = roots();
    fs::create_dir(left.join("sub")).unwrap();
    fs::write(left.join("sub").join("deep.txt"), b"x").unwrap();
    fs::write(left.join("top.txt"), b"x").unwrap();

    let shallow = compare(&left, &right, false);
    let names: Vec<_> = shallow.iter().map(|r| r.relative_path.clone()).collect();
    assert_eq!(names, vec![Path::new("sub").to_path_buf(), Path::new("top.txt").to_path_buf()]);

    let deep = compare(&left, &right, true);
    assert_eq!(deep.len(), 3);
}

#[test]
fn test_results_are_ordered_by_relative_path() {
    let (_temp, left, right) = roots();
    fs::write(left.join("b.txt"), b"b").unwrap();
    fs::write(right.join("a.txt"), b"a").unwrap();
    fs::write(left.join("c.txt"), b"c").unwrap();

    let results = compare(&left, &right, true);
    let names: Vec<_> = results.iter().map(|r| r.relative_path.to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    assert_eq!(results[0].diff_type, DiffType::RightOnly);
}

#[test]
fn test_missing_root_yields_nothing() {
    let (_temp, left, right) = roots();
    fs::write(left.join("a.txt"), b"a").unwrap();
    let missing = right.join("does-not-exist");

    assert!(compare(&left, &missing, true).is_empty());
    assert!(compare(&missing, &left, true).is_empty());
    assert!(plan_sync(&compare(&left, &missing, true), &left, &missing, SyncDirection::Both).is_empty());
}

#[test]
fn test_order_is_plain_string_order() {
    let (_temp, left, right) = roots();
    fs::create_dir(left.join("a")).unwrap();
    fs::write(left.join("a").join("b"), b"x").unwrap();
    fs::write(left.join("a-b"), b"x").unwrap();

    let results = compare(&left, &right, true);
    let names: Vec<_> = results.iter().map(|r| r.relative_path.to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["a", "a-b", "a/b"]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, left, right) = roots();
    fs::write(left.join("keep.txt"), b"k").unwrap();
    let locked = left.join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("secret.txt"), b"s").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let results = compare(&left, &right, true);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(results.iter().all(|r| !r.is_error()));
    let keep = results
        .iter()
        .find(|r| r.relative_path == Path::new("keep.txt"))
        .unwrap();
    assert_eq!(keep.diff_type, DiffType::LeftOnly);
}

#[test]
fn test_failed_comparison_yields_single_sentinel() {
    let (_temp, left, right) = roots();
    fs::write(left.join("a.txt"), b"a").unwrap();

    let config = DiffConfig {
        exclude_patterns: vec!["[unclosed".to_string()],
        ..DiffConfig::default()
    };
    let report = DirectoryDiff::with_config(config).compare(&left, &right);

    assert_eq!(report.entries.len(), 1);
    let sentinel = &report.entries[0];
    assert!(sentinel.is_error());
    assert_eq!(sentinel.diff_type, DiffType::Conflict);
    assert_eq!(sentinel.action, SyncAction::Skip);
    assert!(plan_sync(&report.entries, &left, &right, SyncDirection::Both).is_empty());
}

#[test]
fn test_mtime_tolerance() {
    let (_temp, left, right) = roots();
    let t = SystemTime::now() - Duration::from_secs(600);
    write_at(&left.join("fat.txt"), b"data", t + Duration::from_secs(1));
    write_at(&right.join("fat.txt"), b"data", t);

    let exact = compare(&left, &right, true);
    assert_eq!(exact[0].diff_type, DiffType::LeftNewer);

    let config = DiffConfig::builder().mtime_tolerance_ms(2000u64).build().unwrap();
    let report = DirectoryDiff::with_config(config).compare(&left, &right);
    assert_eq!(report.entries[0].diff_type, DiffType::Identical);
    assert!(report.is_in_sync());
}

#[test]
fn test_exclude_patterns() {
    let (_temp, left, right) = roots();
    fs::write(left.join("keep.txt"), b"k").unwrap();
    fs::write(left.join("scratch.tmp"), b"t").unwrap();
    fs::create_dir_all(left.join("target").join("debug")).unwrap();
    fs::write(left.join("target").join("debug").join("bin"), b"b").unwrap();

    let config = DiffConfig::builder()
        .exclude_patterns(vec!["*.tmp".to_string(), "target".to_string()])
        .build()
        .unwrap();
    let report = DirectoryDiff::with_config(config).compare(&left, &right);

    let names: Vec<_> = report.entries.iter().map(|r| r.relative_path.clone()).collect();
    assert_eq!(names, vec![Path::new("keep.txt").to_path_buf()]);
}

#[test]
fn test_summary_and_swap() {
    let (_temp, left, right) = roots();
    let t = SystemTime::now() - Duration::from_secs(600);
    write_at(&left.join("same.txt"), b"s", t);
    write_at(&right.join("same.txt"), b"s", t);
    fs::write(left.join("mine.txt"), b"m").unwrap();
    fs::write(right.join("theirs.txt"), b"t").unwrap();

    let report = DirectoryDiff::new().compare(&left, &right);
    let summary = report.summary();
    assert_eq!(summary.identical, 1);
    assert_eq!(summary.left_only, 1);
    assert_eq!(summary.right_only, 1);
    assert_eq!(summary.actionable(), 2);

    let swapped = report.swapped();
    assert_eq!(swapped.left_root, right);
    let swapped_summary = swapped.summary();
    assert_eq!(swapped_summary.left_only, 1);
    assert_eq!(swapped_summary.right_only, 1);
    let mine = swapped
        .entries
        .iter()
        .find(|r| r.relative_path == Path::new("mine.txt"))
        .unwrap();
    assert_eq!(mine.diff_type, DiffType::RightOnly);
    assert_eq!(mine.action, SyncAction::CopyRightToLeft);
}

#[test]
fn test_sync_plan_for_new_directory() {
    let (_temp, left, right) = roots();
    fs::create_dir_all(left.join("photos").join("2024")).unwrap();
    fs::write(left.join("photos").join("2024").join("img.jpg"), b"jpg").unwrap();
    fs::write(left.join("photos").join("index.txt"), b"idx").unwrap();

    let results = compare(&left, &right, true);
    assert_eq!(results.len(), 4);

    let jobs = plan_sync(&results, &left, &right, SyncDirection::Both);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].source, left.join("photos"));
    assert_eq!(jobs[0].destination, Some(right.join("photos")));
}
