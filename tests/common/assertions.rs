//! Custom test assertions for integration tests

use driver_depot::{DriverDepot, Event};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wait for an event matching `predicate`
///
/// Returns `None` on timeout or if the channel closes.
pub async fn wait_for_event<F>(depot: &DriverDepot, timeout: Duration, predicate: F) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut events = depot.subscribe();

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await;

    result.unwrap_or(None)
}

/// Files under `root`, relative and sorted
pub fn relative_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Assert that `dest` holds exactly the files of `source`, byte for byte
pub fn assert_tree_matches(source: &Path, dest: &Path) {
    let files = relative_files(source);
    assert_eq!(files, relative_files(dest), "file sets differ");
    for file in files {
        assert_eq!(
            std::fs::read(source.join(&file)).unwrap(),
            std::fs::read(dest.join(&file)).unwrap(),
            "content differs for {}",
            file.display()
        );
    }
}

/// Assert that driver storage holds exactly `expected` (visible files only)
pub fn assert_stored_drivers(driver_dir: &Path, expected: &[&str]) {
    let mut names: Vec<String> = std::fs::read_dir(driver_dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().unwrap().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, expected);
}
