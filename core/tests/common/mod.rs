//! Shared workspace fixture for integration tests.

#![allow(dead_code)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use walkdir::WalkDir;
use wskit_core::ResetOrchestrator;
use wskit_core::archive::ProgressEvent;
use wskit_core::provenance::MockClock;
use wskit_core::provenance::NoVcs;

/// A temporary workspace with a controllable clock.
pub struct Workspace {
    pub dir: TempDir,
    pub clock: Arc<MockClock>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
            clock: Arc::new(MockClock::fixed()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    pub fn read(&self, relative: &str) -> Vec<u8> {
        std::fs::read(self.root().join(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root().join(relative).exists()
    }

    pub fn orchestrator(&self) -> ResetOrchestrator {
        ResetOrchestrator::new(self.root())
            .with_clock(self.clock.clone())
            .with_vcs(Arc::new(NoVcs))
    }

    pub fn archive_dir(&self, id: &str) -> PathBuf {
        self.root().join(".archives").join(id)
    }

    /// Every regular file under `relative`, keyed by workspace-relative path.
    pub fn snapshot(&self, relative: &str) -> BTreeMap<String, Vec<u8>> {
        tree_contents(self.root(), relative)
    }
}

/// Regular files under `root/relative` with their bytes.
pub fn tree_contents(root: &Path, relative: &str) -> BTreeMap<String, Vec<u8>> {
    let start = root.join(relative);
    if !start.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(&start)
        .into_iter()
        .map(Result::unwrap)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let key = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (key, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}

/// Progress events must never lose processed count or change total after
/// counting, and must end in `complete` with everything processed.
pub fn assert_progress_contract(events: &[ProgressEvent]) {
    use wskit_core::archive::Phase;

    assert!(!events.is_empty(), "no progress events");
    assert_eq!(events[0].phase, Phase::Counting);
    let total = events[0].total;
    let mut processed = 0;
    for event in events {
        assert_eq!(event.total, total, "total changed at {event:?}");
        assert!(event.processed >= processed, "processed went backwards at {event:?}");
        assert!(event.processed <= total);
        processed = event.processed;
    }
    let last = events.last().unwrap();
    assert_eq!(last.phase, Phase::Complete);
    assert_eq!(last.processed, total);
    assert_eq!(events[events.len() - 2].phase, Phase::Metadata);
}
