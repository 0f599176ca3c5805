//! Live change notifications for a resolved path.
//!
//! [`watch`] registers the target (and, when `depth > 0`, every directory
//! below it down to that depth) with the platform watcher, then hands events
//! to a background thread. A glob is watched through its matches. For each
//! event that passes the operation filter, the thread stats the changed path
//! afresh, applies the entry filters and publishes a [`WatchEvent`]. A path
//! that no longer exists is judged by the filters that can decide from the
//! path alone ([`Filter::is_match_path`]). Failures go to a separate error
//! channel.
//!
//! Cancellation is cooperative: after [`WatchHandle::cancel`] (or dropping
//! the handle) the thread stops consuming events within one poll interval and
//! drops both senders, which closes the channels.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use crate::engine::{resolve_one, stat_entry};
use crate::entry::Entry;
use crate::error::PathError;
use crate::filter::{passes_all, path_passes_all, DirFilter, Filter};

/// Kind of change reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl WatchOp {
    fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(WatchOp::Create),
            EventKind::Remove(_) => Some(WatchOp::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(WatchOp::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(WatchOp::Chmod),
            EventKind::Modify(_) => Some(WatchOp::Write),
            _ => None,
        }
    }
}

/// One published change.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Path the platform reported.
    pub path: PathBuf,

    pub op: WatchOp,

    /// The path resolved after the event, or `None` if it no longer exists
    /// (removals, the old name of a rename, short-lived files).
    pub entry: Option<Entry>,
}

/// Options for [`watch`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Operations to publish. Empty means all of them.
    pub ops: Vec<WatchOp>,

    /// Bound of the event and error channels. A consumer that falls behind
    /// blocks the background thread once this many items are queued.
    pub capacity: usize,

    /// How often the background thread checks for cancellation.
    pub poll_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ops:           Vec::new(),
            capacity:      64,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Cancels a running watch from any thread.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A running watch. Both channels close once the watch is cancelled.
pub struct WatchHandle {
    pub events: Receiver<WatchEvent>,
    pub errors: Receiver<PathError>,
    token:      CancelToken,
    thread:     Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// A token that cancels this watch, for use from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the background thread to exit.
    pub fn stop(mut self) {
        self.token.cancel();
        let thread = self.thread.take();
        // Dropping the receivers unblocks a thread stuck on a full channel.
        drop(self);
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Watch `path` for changes, `depth` directory levels deep.
///
/// # Errors
///
/// Resolution of `path`, listing of the directories to register, and watcher
/// setup failures are returned here. A glob with no matches has nothing to
/// watch and fails with [`PathError::Watch`]. Errors after setup arrive on
/// [`WatchHandle::errors`].
pub fn watch(
    path: &str,
    depth: usize,
    filters: Vec<Box<dyn Filter>>,
    options: WatchOptions,
) -> Result<WatchHandle, PathError> {
    let targets = watch_targets(path, depth)?;

    let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(raw_tx)
        .map_err(|e| PathError::Watch(format!("error creating watcher: {e}")))?;

    for target in &targets {
        watcher
            .watch(target, RecursiveMode::NonRecursive)
            .map_err(|e| PathError::Watch(format!("error watching {}: {e}", target.display())))?;
    }
    debug!(path, depth, targets = targets.len(), "watch registered");

    let (events_tx, events) = mpsc::sync_channel(options.capacity);
    let (errors_tx, errors) = mpsc::sync_channel(options.capacity);
    let token = CancelToken(Arc::new(AtomicBool::new(false)));

    let worker = Worker {
        filters,
        ops: options.ops,
        events: events_tx,
        errors: errors_tx,
    };
    let thread_token = token.clone();
    let poll = options.poll_interval;
    let thread = thread::spawn(move || {
        // The watcher lives as long as the thread.
        let _watcher = watcher;
        worker.run(raw_rx, &thread_token, poll);
    });

    Ok(WatchHandle {
        events,
        errors,
        token,
        thread: Some(thread),
    })
}

/// The root itself (or each glob match), plus every directory below it when
/// `depth > 0`.
fn watch_targets(path: &str, depth: usize) -> Result<Vec<PathBuf>, PathError> {
    let root = resolve_one(path)?;
    let mut targets: Vec<PathBuf> = if root.is_glob() {
        root.children().iter().map(|e| e.path().to_path_buf()).collect()
    } else {
        vec![root.path().to_path_buf()]
    };

    if depth > 0 {
        for dir in crate::list(path, depth, false, &[&DirFilter])? {
            if !targets.iter().any(|t| t == dir.path()) {
                targets.push(dir.path().to_path_buf());
            }
        }
    }

    if targets.is_empty() {
        return Err(PathError::Watch(format!("nothing to watch for {path}")));
    }
    Ok(targets)
}

struct Worker {
    filters: Vec<Box<dyn Filter>>,
    ops:     Vec<WatchOp>,
    events:  SyncSender<WatchEvent>,
    errors:  SyncSender<PathError>,
}

impl Worker {
    fn run(self, raw: Receiver<notify::Result<Event>>, token: &CancelToken, poll: Duration) {
        while !token.is_cancelled() {
            let published = match raw.recv_timeout(poll) {
                Ok(Ok(event)) => self.handle(event),
                Ok(Err(e)) => self.errors.send(PathError::Watch(e.to_string())).is_ok(),
                Err(RecvTimeoutError::Timeout) => true,
                Err(RecvTimeoutError::Disconnected) => false,
            };
            if !published {
                break;
            }
        }
        debug!("watch stopped");
    }

    /// Returns `false` once the event or error consumer has gone away.
    fn handle(&self, event: Event) -> bool {
        let Some(op) = WatchOp::from_kind(&event.kind) else {
            return true;
        };
        if !self.ops.is_empty() && !self.ops.contains(&op) {
            return true;
        }

        for path in event.paths {
            let delivered = match self.resolve(&path) {
                Ok(Some(entry)) => self.events.send(WatchEvent { path, op, entry: Some(entry) }),
                Ok(None) => {
                    trace!(path = %path.display(), "filtered out");
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    if path_passes_all(&self.filters(), &path) {
                        self.events.send(WatchEvent { path, op, entry: None })
                    } else {
                        trace!(path = %path.display(), "vanished path filtered out");
                        Ok(())
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "watch event failed");
                    if self.errors.send(e).is_err() {
                        return false;
                    }
                    Ok(())
                }
            };
            if delivered.is_err() {
                return false;
            }
        }
        true
    }

    fn filters(&self) -> Vec<&dyn Filter> {
        self.filters.iter().map(|f| &**f).collect()
    }

    /// Event paths are concrete: they are stat'ed as is, never glob-expanded.
    fn resolve(&self, path: &Path) -> Result<Option<Entry>, PathError> {
        let entry = stat_entry(path)?;
        if passes_all(&self.filters(), &entry)? {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Instant;

    use notify::event::{CreateKind, RemoveKind};

    use super::*;
    use crate::filter::{RegexFilter, SizeRangeFilter};

    type Channels = (Receiver<WatchEvent>, Receiver<PathError>);

    fn test_worker(filters: Vec<Box<dyn Filter>>) -> (Worker, Channels) {
        let (events_tx, events) = mpsc::sync_channel(16);
        let (errors_tx, errors) = mpsc::sync_channel(16);
        let worker = Worker {
            filters,
            ops: Vec::new(),
            events: events_tx,
            errors: errors_tx,
        };
        (worker, (events, errors))
    }

    struct Broken;

    impl Filter for Broken {
        fn is_match(&self, entry: &Entry) -> Result<bool, PathError> {
            Err(PathError::FilterEvaluation {
                path: entry.path().to_path_buf(),
                message: "broken".into(),
            })
        }
    }

    #[test]
    fn op_mapping() {
        use notify::event::{DataChange, MetadataKind, RenameMode};

        assert_eq!(WatchOp::from_kind(&EventKind::Create(CreateKind::File)), Some(WatchOp::Create));
        assert_eq!(WatchOp::from_kind(&EventKind::Remove(RemoveKind::File)), Some(WatchOp::Remove));
        assert_eq!(
            WatchOp::from_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(WatchOp::Write)
        );
        assert_eq!(
            WatchOp::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(WatchOp::Rename)
        );
        assert_eq!(
            WatchOp::from_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            Some(WatchOp::Chmod)
        );
        assert_eq!(WatchOp::from_kind(&EventKind::Any), None);
    }

    #[test]
    fn missing_root_fails_up_front() {
        let err = watch("/definitely/does/not/exist", 0, Vec::new(), WatchOptions::default())
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn cancel_closes_channels() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = watch(
            &tmp.path().display().to_string(),
            0,
            Vec::new(),
            WatchOptions::default(),
        )
        .unwrap();

        handle.cancel_token().cancel();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match handle.events.recv_timeout(Duration::from_millis(200)) {
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                _ if Instant::now() > deadline => panic!("events channel never closed"),
                _ => {}
            }
        }
        assert!(handle.errors.recv().is_err());
    }

    #[test]
    fn publishes_filtered_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = watch(
            &tmp.path().display().to_string(),
            0,
            vec![Box::new(RegexFilter::from_pattern(r"\.txt$").unwrap())],
            WatchOptions {
                ops: vec![WatchOp::Create, WatchOp::Write],
                ..WatchOptions::default()
            },
        )
        .unwrap();

        fs::write(tmp.path().join("file1.txt"), "a").unwrap();
        fs::write(tmp.path().join("file1.mp3"), "b").unwrap();
        fs::write(tmp.path().join("file2.txt"), "c").unwrap();

        let mut seen = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && seen.len() < 2 {
            if let Ok(event) = handle.events.recv_timeout(Duration::from_millis(200)) {
                let entry = event.entry.expect("created files still exist");
                assert!(entry.name().ends_with(".txt"), "unexpected {}", entry);
                if !seen.contains(&entry.name()) {
                    seen.push(entry.name());
                }
            }
        }
        seen.sort();
        assert_eq!(seen, ["file1.txt", "file2.txt"]);
        handle.stop();
    }

    #[test]
    fn vanished_paths_respect_path_filters() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, (events, _errors)) =
            test_worker(vec![Box::new(RegexFilter::from_pattern(r"\.txt$").unwrap())]);

        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(tmp.path().join("gone.mp3"))
            .add_path(tmp.path().join("gone.txt"));
        assert!(worker.handle(removed));

        let event = events.try_recv().unwrap();
        assert_eq!(event.path, tmp.path().join("gone.txt"));
        assert_eq!(event.op, WatchOp::Remove);
        assert!(event.entry.is_none());
        assert!(events.try_recv().is_err(), "gone.mp3 must not be published");
    }

    #[test]
    fn vanished_paths_fail_metadata_filters() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, (events, _errors)) = test_worker(vec![Box::new(SizeRangeFilter::new(0, 10))]);

        let removed =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(tmp.path().join("gone.txt"));
        assert!(worker.handle(removed));
        assert!(events.try_recv().is_err());

        let (worker, (events, _errors)) = test_worker(Vec::new());
        let removed =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(tmp.path().join("gone.txt"));
        assert!(worker.handle(removed));
        assert!(events.try_recv().unwrap().entry.is_none());
    }

    #[test]
    fn event_paths_are_not_glob_expanded() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a[1].txt"), "").unwrap();
        fs::write(tmp.path().join("a1.txt"), "").unwrap();
        let (worker, (events, _errors)) = test_worker(Vec::new());

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(tmp.path().join("a[1].txt"));
        assert!(worker.handle(created));

        let entry = events.try_recv().unwrap().entry.unwrap();
        assert_eq!(entry.path(), tmp.path().join("a[1].txt"));
        assert!(!entry.is_glob());
    }

    #[test]
    fn glob_watches_its_matches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("c.mp3"), "").unwrap();
        let pattern = format!("{}/*.txt", tmp.path().display());

        let mut targets = watch_targets(&pattern, 0).unwrap();
        targets.sort();
        assert_eq!(targets, [tmp.path().join("a.txt"), tmp.path().join("b.txt")]);

        let handle = watch(&pattern, 0, Vec::new(), WatchOptions::default()).unwrap();
        handle.stop();
    }

    #[test]
    fn glob_watch_adds_directories_below_matches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("d1/inner")).unwrap();
        fs::create_dir(tmp.path().join("d2")).unwrap();

        let targets = watch_targets(&format!("{}/d*", tmp.path().display()), 2).unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets.contains(&tmp.path().join("d1/inner")));
    }

    #[test]
    fn zero_match_glob_has_nothing_to_watch() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = format!("{}/nomatch*", tmp.path().display());

        let err = watch(&pattern, 1, Vec::new(), WatchOptions::default()).err().unwrap();
        assert!(matches!(err, PathError::Watch(_)), "{err}");
    }

    #[test]
    fn dropped_error_receiver_stops_the_worker() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let (worker, (_events, errors)) = test_worker(vec![Box::new(Broken)]);
        drop(errors);

        let created =
            Event::new(EventKind::Create(CreateKind::File)).add_path(tmp.path().join("a.txt"));
        assert!(!worker.handle(created));
    }

    #[test]
    fn watcher_error_with_no_listener_ends_the_run() {
        let (worker, (_events, errors)) = test_worker(Vec::new());
        drop(errors);

        let (raw_tx, raw_rx) = mpsc::channel();
        raw_tx.send(Err(notify::Error::generic("backend failure"))).unwrap();
        let token = CancelToken(Arc::new(AtomicBool::new(false)));

        // Returns even though the raw sender is still alive.
        worker.run(raw_rx, &token, Duration::from_millis(10));
        drop(raw_tx);
    }

    #[test]
    fn filter_failures_go_to_the_error_channel() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let (worker, (events, errors)) = test_worker(vec![Box::new(Broken)]);

        let created =
            Event::new(EventKind::Create(CreateKind::File)).add_path(tmp.path().join("a.txt"));
        assert!(worker.handle(created));
        assert!(events.try_recv().is_err());
        assert!(matches!(errors.try_recv().unwrap(), PathError::FilterEvaluation { .. }));
    }
}
