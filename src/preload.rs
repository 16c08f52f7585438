use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;

use crate::server_api;

pub struct PreloadDone {
    pub url: String,
    pub result: Result<PathBuf, String>,
}

enum Slot {
    Pending,
    Ready(PathBuf),
    /// Download failed; held so reconciliation does not retry in a loop.
    Failed,
}

/// Sliding-window cache of downloaded clips. Bookkeeping lives here, on
/// the UI thread; the actual downloads run on a worker thread and report
/// back through `done_rx`. A slot that leaves the window is evicted and
/// its bytes deleted; a download finishing for a URL that already left the
/// window is discarded on arrival.
pub struct PreloadPool {
    cache_dir: PathBuf,
    slots: HashMap<String, Slot>,
    req_tx: Sender<String>,
    pub done_rx: Receiver<PreloadDone>,
}

impl PreloadPool {
    pub fn new(server: &str, cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("create cache dir {}", cache_dir.display()))?;
        let (req_tx, req_rx) = unbounded::<String>();
        let (done_tx, done_rx) = unbounded::<PreloadDone>();
        spawn_worker(server.to_string(), cache_dir.clone(), req_rx, done_tx);
        Ok(Self::with_channels(cache_dir, req_tx, done_rx))
    }

    fn with_channels(
        cache_dir: PathBuf,
        req_tx: Sender<String>,
        done_rx: Receiver<PreloadDone>,
    ) -> Self {
        Self {
            cache_dir,
            slots: HashMap::new(),
            req_tx,
            done_rx,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Request a download unless the URL is already tracked.
    pub fn request(&mut self, url: &str) {
        if self.slots.contains_key(url) {
            return;
        }
        self.slots.insert(url.to_string(), Slot::Pending);
        let _ = self.req_tx.send(url.to_string());
    }

    /// Forget a failed slot and try again. Used when the user navigates
    /// onto a clip whose earlier download failed.
    pub fn retry(&mut self, url: &str) {
        if matches!(self.slots.get(url), Some(Slot::Failed)) {
            self.slots.remove(url);
        }
        self.request(url);
    }

    /// Make the tracked set equal `wanted` ∪ `current`: evict everything
    /// else (deleting cached bytes) and request what is missing. `current`
    /// is the clip at the cursor, which must never be evicted while shown.
    pub fn reconcile(&mut self, wanted: &[String], current: Option<&str>) {
        let stale: Vec<String> = self
            .slots
            .keys()
            .filter(|url| !wanted.iter().any(|w| w == *url) && current != Some(url.as_str()))
            .cloned()
            .collect();
        for url in stale {
            if let Some(Slot::Ready(path)) = self.slots.remove(&url) {
                let _ = std::fs::remove_file(path);
            }
        }
        for url in wanted {
            self.request(url);
        }
    }

    /// Record a finished download.
    pub fn note_done(&mut self, done: PreloadDone) {
        match done.result {
            Ok(path) => {
                if self.slots.contains_key(&done.url) {
                    self.slots.insert(done.url, Slot::Ready(path));
                } else {
                    // Left the window while downloading.
                    let _ = std::fs::remove_file(path);
                }
            }
            Err(err) => {
                warn!("Preload of {} failed: {err}", done.url);
                if self.slots.contains_key(&done.url) {
                    self.slots.insert(done.url, Slot::Failed);
                }
            }
        }
    }

    /// Hand a ready file to the caller, transferring ownership out of the
    /// pool.
    pub fn take_ready(&mut self, url: &str) -> Option<PathBuf> {
        if matches!(self.slots.get(url), Some(Slot::Ready(_))) {
            if let Some(Slot::Ready(path)) = self.slots.remove(url) {
                return Some(path);
            }
        }
        None
    }

    /// Return a file previously taken with `take_ready`. Kept if the URL
    /// is still wanted, deleted otherwise.
    pub fn give_back(&mut self, url: String, path: PathBuf, still_wanted: bool) {
        if still_wanted {
            self.slots.insert(url, Slot::Ready(path));
        } else {
            let _ = std::fs::remove_file(path);
        }
    }

    pub fn is_pending(&self, url: &str) -> bool {
        matches!(self.slots.get(url), Some(Slot::Pending))
    }

    pub fn has_failed(&self, url: &str) -> bool {
        matches!(self.slots.get(url), Some(Slot::Failed))
    }

    /// Number of tracked slots; bounded by the window plus the current
    /// clip.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn spawn_worker(
    server: String,
    cache_dir: PathBuf,
    req_rx: Receiver<String>,
    done_tx: Sender<PreloadDone>,
) {
    std::thread::spawn(move || {
        let client = match server_api::make_client() {
            Ok(client) => client,
            Err(e) => {
                warn!("Preload worker could not start: {e:#}");
                return;
            }
        };
        while let Ok(url) = req_rx.recv() {
            let dest = cache_path(&cache_dir, &url);
            let result = server_api::download(&client, &server, &url, &dest)
                .map(|_| dest)
                .map_err(|e| format!("{e:#}"));
            if done_tx.send(PreloadDone { url, result }).is_err() {
                break;
            }
        }
    });
}

fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let name = url.rsplit('/').next().unwrap_or(url);
    cache_dir.join(name)
}
