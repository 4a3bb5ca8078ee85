//! End-to-end lifecycle tests against a real temporary trash root.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use trash_lifecycle::{
    BatchOutcome, DeleteOptions, ErrorKind, RestoreOptions, RestoreSelector, SortKey, TrashBin,
    TrashConfig,
};

struct World {
    bin: TrashBin,
    _trash_dir: tempfile::TempDir,
    work_dir: tempfile::TempDir,
}

fn world(config: TrashConfig) -> World {
    let trash_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let bin = TrashBin::open_at(config, trash_dir.path()).unwrap();
    World {
        bin,
        _trash_dir: trash_dir,
        work_dir,
    }
}

fn file_in(world: &World, name: &str, content: &[u8]) -> PathBuf {
    let path = world.work_dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn delete_then_restore_round_trips_content() {
    let world = world(TrashConfig::default());
    let content = b"the quick brown fox".to_vec();
    let path = file_in(&world, "fox.txt", &content);

    let results = world.bin.delete(&[path.clone()], &DeleteOptions::default());
    assert!(results[0].success);
    assert!(!path.exists());

    let listed = world.bin.list(SortKey::Time);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].size, content.len() as u64);
    assert!(listed[0].checksum.is_some());

    let restored = world
        .bin
        .restore(&RestoreSelector::All, &RestoreOptions::default())
        .unwrap();
    assert!(restored[0].success, "error: {:?}", restored[0].error);
    assert_eq!(fs::read(&path).unwrap(), content);
    assert!(world.bin.list(SortKey::Time).is_empty());
}

#[test]
fn deleting_an_absent_path_fails_rather_than_silently_succeeding() {
    let world = world(TrashConfig::default());
    let path = file_in(&world, "twice.txt", b"x");

    let first = world.bin.delete(&[path.clone()], &DeleteOptions::default());
    assert!(first[0].success);

    let second = world.bin.delete(&[path], &DeleteOptions::default());
    assert!(!second[0].success);
    assert_eq!(second[0].error_kind(), Some(ErrorKind::FileNotFound));
    assert!(!second[0].error.as_ref().unwrap().retryable());
}

#[test]
fn batch_results_are_index_aligned_and_complete() {
    let world = world(TrashConfig::default().with_max_concurrency(4));
    let a = file_in(&world, "a.txt", b"a");
    let b = world.work_dir.path().join("not-there.txt");
    let c = file_in(&world, "c.txt", b"c");

    let paths = vec![a.clone(), b.clone(), c.clone()];
    let results = world.bin.delete(&paths, &DeleteOptions::default());

    let got: Vec<&PathBuf> = results.iter().map(|r| &r.path).collect();
    assert_eq!(got, vec![&a, &b, &c]);

    let outcome = BatchOutcome::of_deletes(&results);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
}

#[test]
fn peak_concurrency_never_exceeds_the_configured_limit() {
    let limit = 4usize;
    let world = world(TrashConfig::default().with_max_concurrency(limit));
    let paths: Vec<PathBuf> = (0..64)
        .map(|i| file_in(&world, &format!("bulk-{i}.dat"), &vec![0u8; 256]))
        .collect();

    let results = world.bin.delete(&paths, &DeleteOptions::default());
    assert_eq!(results.len(), 64);
    assert!(results.iter().all(|r| r.success));

    let snap = world.bin.metrics();
    assert_eq!(snap.operations, 64);
    assert!(
        snap.peak_in_flight <= limit as u64,
        "peak {} exceeded limit {limit}",
        snap.peak_in_flight
    );
}

#[cfg(unix)]
#[test]
fn protected_paths_are_refused_without_touching_disk() {
    let world = world(TrashConfig::default());
    let results = world
        .bin
        .delete(&[PathBuf::from("/usr/bin/ls")], &DeleteOptions::default());
    assert!(!results[0].success);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::ProtectedPath));
    assert!(world.bin.list(SortKey::Name).is_empty());
}

#[test]
fn restoring_over_an_existing_file_backs_it_up() {
    let world = world(TrashConfig::default());
    let path = file_in(&world, "contested.txt", b"original");

    world.bin.delete(&[path.clone()], &DeleteOptions::default());
    fs::write(&path, b"usurper").unwrap();

    let results = world
        .bin
        .restore(&RestoreSelector::All, &RestoreOptions::default())
        .unwrap();
    assert!(results[0].success, "error: {:?}", results[0].error);
    assert_eq!(fs::read(&path).unwrap(), b"original");

    let backup = fs::read_dir(world.work_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.to_string_lossy().contains(".backup."))
        .expect("backup of the displaced file");
    assert_eq!(fs::read(backup).unwrap(), b"usurper");
}

#[test]
fn cleanup_evicts_only_aged_orphans() {
    let world = world(TrashConfig::default());
    let keep = file_in(&world, "keep.txt", b"k");
    let lose = file_in(&world, "lose.txt", b"l");
    world
        .bin
        .delete(&[keep, lose], &DeleteOptions::default());

    let items = world.bin.list(SortKey::Name);
    let lost = items.iter().find(|i| i.name == "lose.txt").unwrap();
    fs::remove_file(&lost.trash_path).unwrap();

    // Records are fresh, so even the orphan survives a short max-age.
    assert_eq!(world.bin.cleanup(Duration::from_secs(3600)).unwrap(), 0);

    // With a zero max-age the orphan goes; the live record never does.
    assert_eq!(world.bin.cleanup(Duration::ZERO).unwrap(), 1);
    let remaining = world.bin.list(SortKey::Name);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "keep.txt");
}

#[test]
fn empty_is_irreversible_and_reports_totals() {
    let world = world(TrashConfig::default());
    let paths = vec![
        file_in(&world, "p.txt", b"12345"),
        file_in(&world, "q.txt", b"123"),
    ];
    world.bin.delete(&paths, &DeleteOptions::default());

    let (purged, bytes) = world.bin.empty(false).unwrap();
    assert_eq!(purged, 2);
    assert_eq!(bytes, 8);

    let err = world
        .bin
        .restore(&RestoreSelector::All, &RestoreOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn directories_round_trip_recursively() {
    let world = world(TrashConfig::default());
    let tree = world.work_dir.path().join("project");
    fs::create_dir_all(tree.join("src")).unwrap();
    fs::write(tree.join("src/main.rs"), b"fn main() {}").unwrap();
    fs::write(tree.join("README.md"), b"# project").unwrap();

    let options = DeleteOptions {
        recursive: true,
        ..Default::default()
    };
    let results = world.bin.delete(&[tree.clone()], &options);
    assert!(results[0].success, "error: {:?}", results[0].error);
    assert!(!tree.exists());

    world
        .bin
        .restore(&RestoreSelector::All, &RestoreOptions::default())
        .unwrap();
    assert_eq!(fs::read(tree.join("src/main.rs")).unwrap(), b"fn main() {}");
    assert_eq!(fs::read(tree.join("README.md")).unwrap(), b"# project");
}

#[test]
fn metadata_survives_reopening_the_bin() {
    let trash_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let path = work_dir.path().join("durable.txt");
    fs::write(&path, b"still here").unwrap();

    {
        let bin = TrashBin::open_at(TrashConfig::default(), trash_dir.path()).unwrap();
        let results = bin.delete(&[path.clone()], &DeleteOptions::default());
        assert!(results[0].success);
    }

    let bin = TrashBin::open_at(TrashConfig::default(), trash_dir.path()).unwrap();
    let listed = bin.list(SortKey::Time);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "durable.txt");

    let results = bin
        .restore(&RestoreSelector::All, &RestoreOptions::default())
        .unwrap();
    assert!(results[0].success, "error: {:?}", results[0].error);
    assert_eq!(fs::read(&path).unwrap(), b"still here");
}
