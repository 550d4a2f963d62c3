//! Reload loop driven by filesystem events

use crate::session::Session;
use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Debounce duration for file changes (default: 100ms)
    pub debounce_duration: Duration,
    /// Variables to print after each reload; empty prints the whole graph
    pub paths: Vec<String>,
}

/// Block forever, reloading whatever changes on disk
pub fn run(session: &mut Session, config: &WatchConfig) -> Result<()> {
    let (tx, rx) = channel::<DebounceEventResult>();
    let mut debouncer =
        new_debouncer(config.debounce_duration, tx).context("Failed to create file watcher")?;

    let mut watched = BTreeSet::new();
    watch_directories(&mut debouncer, session, &mut watched)?;

    for result in rx {
        let events = match result {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!("Watch error: {err}");
                continue;
            }
        };
        let changed: Vec<PathBuf> = events
            .into_iter()
            .map(|event| event.path)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tracing::debug!("Changed: {:?}", changed);

        if session.reload_changed(&changed) {
            print!("{}", session.render(&config.paths));
        }
        watch_directories(&mut debouncer, session, &mut watched)?;
    }
    Ok(())
}

/// Watch the directory of every registered file. Directories rather than
/// files so editors that replace files on save keep being seen.
fn watch_directories(
    debouncer: &mut Debouncer<RecommendedWatcher>,
    session: &Session,
    watched: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    for dir in session.directories() {
        if watched.contains(&dir) {
            continue;
        }
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        tracing::info!("Watching: {}", dir.display());
        watched.insert(dir);
    }
    Ok(())
}
