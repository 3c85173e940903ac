// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::watch::path_utils::project_path;
use crate::watch::subscriber::WatchSubscriber;

/// Keeps the OS watcher alive; file events stop when this is dropped.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WatcherHandle")
    }
}

/// Reads and bare metadata probes leave file contents alone.
fn touches_content(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Watch the subscriber's root recursively and feed every changed project
/// path into [`WatchSubscriber::dispatch`].
///
/// The subscription table decides what matters, so closures that grow into
/// new directories are covered without re-registering watches.
pub fn spawn_watcher(subscriber: WatchSubscriber) -> Result<WatcherHandle> {
    let root: PathBuf = subscriber.root().to_path_buf();
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    // notify calls this on its own thread; the receiver may already be gone
    // during shutdown, which is fine to ignore.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;
    info!(root = %root.display(), "watching for changes");

    tokio::spawn(async move {
        while let Some(res) = rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watch error");
                    continue;
                }
            };
            if !touches_content(&event.kind) {
                continue;
            }
            trace!(?event, "file event");

            let paths: BTreeSet<PathBuf> = event
                .paths
                .iter()
                .filter_map(|p| project_path(&root, p))
                .collect();
            for path in paths {
                subscriber.dispatch(&path);
            }
        }
        debug!("file watcher stopped");
    });

    Ok(WatcherHandle { _watcher: watcher })
}
