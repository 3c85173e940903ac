// src/watch/subscriber.rs

//! Change-triggered rebuilds.
//!
//! Every [`WatchTarget`] gets its own worker task fed by an unbounded
//! channel of changed paths. A worker:
//! - waits for a first change, then keeps absorbing changes until the
//!   target has been quiet for the debounce window;
//! - runs exactly one rebuild for the accumulated set;
//! - replaces the target's subscriptions with the rebuild's new closure.
//!
//! Changes arriving while a rebuild is in flight queue up in the channel and
//! are coalesced into a single follow-up rebuild. Different targets run in
//! parallel; one target never rebuilds concurrently with itself.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::RebundleError;
use crate::fs::{normalize_path, rel_string};
use crate::types::TaskId;
use crate::watch::patterns::PatternSet;
use crate::watch::subscriptions::{SubscriptionTable, WatchTarget};

/// Result of one rebuild of a watch target.
#[derive(Debug, Default)]
pub struct RebuildOutcome {
    /// New exact subscription set; `None` keeps the current one.
    pub watched: Option<BTreeSet<PathBuf>>,
    /// Output files that were (re)written.
    pub written: Vec<PathBuf>,
    pub error: Option<RebundleError>,
}

/// Something a watch target can re-run.
pub trait Rebuild: Send + Sync {
    fn rebuild<'a>(
        &'a self,
        changed: Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = RebuildOutcome> + Send + 'a>>;
}

/// Broadcast after a successful rebuild that wrote output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildNotice {
    pub target: String,
    pub files: Vec<PathBuf>,
}

struct EntryGlob {
    task: TaskId,
    patterns: PatternSet,
    known: BTreeSet<PathBuf>,
}

struct Shared {
    root: PathBuf,
    debounce: Duration,
    table: Mutex<SubscriptionTable>,
    workers: Mutex<HashMap<WatchTarget, mpsc::UnboundedSender<PathBuf>>>,
    entry_globs: Mutex<Vec<EntryGlob>>,
    warned: Mutex<HashSet<PathBuf>>,
    notices: broadcast::Sender<RebuildNotice>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes file changes to per-target rebuild workers.
#[derive(Clone)]
pub struct WatchSubscriber {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WatchSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscriber")
            .field("root", &self.shared.root)
            .field("debounce", &self.shared.debounce)
            .finish_non_exhaustive()
    }
}

impl WatchSubscriber {
    /// `root` must be the same (normalized) root that produced the paths
    /// later passed to [`subscribe`](Self::subscribe) and
    /// [`dispatch`](Self::dispatch). Fatal rebuild errors are reported on
    /// `runtime_tx`.
    pub fn new(root: &Path, debounce: Duration, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                root: normalize_path(root),
                debounce,
                table: Mutex::new(SubscriptionTable::new()),
                workers: Mutex::new(HashMap::new()),
                entry_globs: Mutex::new(Vec::new()),
                warned: Mutex::new(HashSet::new()),
                notices,
                runtime_tx,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Watch exactly `paths` for `target`, re-running `rebuild` on change.
    ///
    /// Calling this again for the same target replaces its paths and keeps
    /// the existing worker.
    pub fn subscribe(&self, target: WatchTarget, paths: BTreeSet<PathBuf>, rebuild: Arc<dyn Rebuild>) {
        let delta = lock(&self.shared.table).replace(&target, paths);
        debug!(watch_target = %target, added = delta.added.len(), removed = delta.removed.len(), "subscribed");
        self.ensure_worker(target, rebuild);
    }

    /// Re-run `rebuild` whenever a path matching `patterns` changes.
    pub fn subscribe_patterns(&self, target: WatchTarget, patterns: PatternSet, rebuild: Arc<dyn Rebuild>) {
        debug!(watch_target = %target, ?patterns, "subscribed to patterns");
        lock(&self.shared.table).add_patterns(target.clone(), patterns);
        self.ensure_worker(target, rebuild);
    }

    /// Report files appearing under an entry glob. Entries are resolved once
    /// per process, so such files only produce a log line.
    pub fn watch_entry_roots(&self, task: TaskId, patterns: PatternSet, known: BTreeSet<PathBuf>) {
        lock(&self.shared.entry_globs).push(EntryGlob {
            task,
            patterns,
            known,
        });
    }

    /// Receive a notice after every successful rebuild.
    pub fn notices(&self) -> broadcast::Receiver<RebuildNotice> {
        self.shared.notices.subscribe()
    }

    pub fn watched_paths(&self, target: &WatchTarget) -> BTreeSet<PathBuf> {
        lock(&self.shared.table).watched_paths(target)
    }

    /// Route a change of `path` to every target subscribed to it.
    ///
    /// Returns the number of targets notified.
    pub fn dispatch(&self, path: &Path) -> usize {
        let path = normalize_path(path);
        let rel = rel_string(&self.shared.root, &path);
        let targets = lock(&self.shared.table).targets_for(&path, &rel);

        if targets.is_empty() {
            self.check_new_entry(&path, &rel);
            return 0;
        }

        let workers = lock(&self.shared.workers);
        let mut notified = 0;
        for target in targets {
            match workers.get(&target) {
                Some(tx) if tx.send(path.clone()).is_ok() => {
                    debug!(watch_target = %target, path = %path.display(), "change queued");
                    notified += 1;
                }
                _ => warn!(watch_target = %target, "no rebuild worker for target"),
            }
        }
        notified
    }

    fn check_new_entry(&self, path: &Path, rel: &str) {
        let globs = lock(&self.shared.entry_globs);
        for glob in globs.iter() {
            if glob.patterns.is_match(rel)
                && !glob.known.contains(path)
                && lock(&self.shared.warned).insert(path.to_path_buf())
            {
                warn!(
                    task = %glob.task,
                    path = %rel,
                    "new file matches the entry globs; restart required to bundle it"
                );
            }
        }
    }

    fn ensure_worker(&self, target: WatchTarget, rebuild: Arc<dyn Rebuild>) {
        let mut workers = lock(&self.shared.workers);
        if workers.contains_key(&target) {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        workers.insert(target.clone(), tx);
        tokio::spawn(run_worker(Arc::clone(&self.shared), target, rebuild, rx));
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    target: WatchTarget,
    rebuild: Arc<dyn Rebuild>,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
) {
    while let Some(first) = rx.recv().await {
        let mut changed = BTreeSet::from([first]);

        // Absorb changes until the target has been quiet for one window.
        while let Ok(Some(path)) = tokio::time::timeout(shared.debounce, rx.recv()).await {
            changed.insert(path);
        }

        info!(watch_target = %target, files = changed.len(), "change detected; rebuilding");
        let outcome = rebuild.rebuild(changed.into_iter().collect()).await;
        apply_outcome(&shared, &target, outcome).await;
    }
    debug!(watch_target = %target, "rebuild worker finished");
}

async fn apply_outcome(shared: &Shared, target: &WatchTarget, outcome: RebuildOutcome) {
    if let Some(paths) = outcome.watched {
        let delta = lock(&shared.table).replace(target, paths);
        if !delta.is_empty() {
            info!(
                watch_target = %target,
                added = delta.added.len(),
                removed = delta.removed.len(),
                "watch set updated"
            );
        }
    }

    match outcome.error {
        Some(err) if err.is_fatal() => {
            error!(watch_target = %target, error = %err, "rebuild failed with a fatal error");
            let message = format!("{target}: {err}");
            if shared
                .runtime_tx
                .send(RuntimeEvent::Fatal { message })
                .await
                .is_err()
            {
                debug!("runtime gone; fatal error not delivered");
            }
        }
        Some(err) => {
            error!(watch_target = %target, error = %err, "rebuild failed; still watching");
        }
        None if !outcome.written.is_empty() => {
            // No receivers is fine: notifiers are optional.
            let _ = shared.notices.send(RebuildNotice {
                target: target.to_string(),
                files: outcome.written,
            });
        }
        None => {}
    }
}
