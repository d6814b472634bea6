use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Blob files that changed on disk, reported by key (file stem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobsChanged(pub Vec<String>);

/// Watches the data directory so a long-running `tn focus run` notices
/// writes made by other `tn` processes.
pub struct DataWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<BlobsChanged>,
}

impl DataWatcher {
    pub fn start(data_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let dir = data_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else { return };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                let keys = blob_keys(&dir, &event.paths);
                if !keys.is_empty() {
                    let _ = tx.send(BlobsChanged(keys));
                }
            },
            Config::default(),
        )?;

        watcher.watch(data_dir, RecursiveMode::NonRecursive)?;
        Ok(DataWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Drain pending change notifications without blocking.
    pub fn poll(&self) -> Vec<String> {
        let mut keys = Vec::new();
        while let Ok(BlobsChanged(batch)) = self.rx.try_recv() {
            for key in batch {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

/// Keep only `<key>.json` files directly inside `dir`.
fn blob_keys(dir: &Path, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| p.parent() == Some(dir))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect()
}
