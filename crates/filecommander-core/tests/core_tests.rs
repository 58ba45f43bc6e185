use std::path::{Path, PathBuf};

use filecommander_core::{
    DriveKeyMode, DriveResolver, Job, JobStatus, LexicalRoots, OperationKind, QueueConfig,
};

/// Treats the first path component as the "drive".
#[derive(Debug)]
struct FirstComponent;

impl DriveResolver for FirstComponent {
    fn root_of(&self, path: &Path) -> Option<PathBuf> {
        path.components().nth(1).map(|c| PathBuf::from(c.as_os_str()))
    }
}

#[test]
fn test_drive_pair_key_with_custom_resolver() {
    let job = Job::copy("/disk1/photos/a.jpg", "/disk2/backup/a.jpg");
    assert_eq!(job.drive_pair_key(&FirstComponent).as_str(), "disk1:disk2");

    let same_pair = Job::copy("/disk1/docs/b.txt", "/disk2/other/b.txt");
    assert_eq!(
        job.drive_pair_key(&FirstComponent),
        same_pair.drive_pair_key(&FirstComponent)
    );

    let other_pair = Job::copy("/disk3/x", "/disk2/x");
    assert_ne!(
        job.drive_pair_key(&FirstComponent),
        other_pair.drive_pair_key(&FirstComponent)
    );
}

#[test]
fn test_delete_key_degenerates_to_unknown_destination() {
    let job = Job::delete("/disk1/trash.txt");
    assert_eq!(job.drive_pair_key(&FirstComponent).as_str(), "disk1:unknown");
}

#[cfg(unix)]
#[test]
fn test_lexical_keys_collapse_on_unix() {
    let a = Job::copy("/home/user/a", "/mnt/usb/a");
    let b = Job::move_to("/var/tmp/b", "/srv/b");
    assert_eq!(a.drive_pair_key(&LexicalRoots), b.drive_pair_key(&LexicalRoots));
    assert_eq!(a.drive_pair_key(&LexicalRoots).as_str(), "/:/");
}

#[test]
fn test_operation_kind_helpers() {
    assert!(!OperationKind::Copy.is_structural());
    assert!(OperationKind::Move.is_structural());
    assert!(OperationKind::Delete.is_structural());
    assert!(!OperationKind::Delete.needs_destination());
    assert_eq!(OperationKind::Move.to_string(), "Move");
}

#[test]
fn test_failed_job_keeps_partial_progress() {
    let mut job = Job::copy("/a", "/b");
    job.transition(JobStatus::Running);
    job.set_progress(35);
    assert!(job.transition(JobStatus::Failed));
    assert_eq!(job.progress, 35);
    assert!(job.status.is_terminal());
    assert!(!job.transition(JobStatus::Completed));
}

#[test]
fn test_queue_config_from_partial_json() {
    let config: QueueConfig =
        serde_json::from_str(r#"{ "auto_start": false, "drive_keys": "lexical" }"#).unwrap();

    assert!(!config.auto_start);
    assert_eq!(config.drive_keys, DriveKeyMode::Lexical);
    assert!(config.preserve_timestamps);
    assert_eq!(config.event_capacity, 1024);
}
