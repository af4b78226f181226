use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use floorwatch_directory::{DirectorySource, RawRecord, RetryPolicy, retry};
use floorwatch_identity::{IdentityCache, Snapshot};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MonitorError;

/// Outcome of one successful roster refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Records returned by the directory.
    pub fetched: usize,
    /// Records installed in the new snapshot.
    pub installed: usize,
    /// Entries dropped as malformed or for an unusable embedding.
    pub skipped: usize,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Decodes and validates raw roster entries one at a time and stacks the
/// survivors into a snapshot.
///
/// Returns the snapshot and the number of entries skipped. Entry order is
/// preserved.
pub fn build_snapshot(
    dim: usize,
    raw: Vec<Value>,
    captured_at: DateTime<Utc>,
) -> Result<(Snapshot, usize), MonitorError> {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for entry in raw {
        match RawRecord::from_value(entry).and_then(|r| r.into_identity(dim)) {
            Ok(r) => records.push(r),
            Err(e) if e.is_malformed_record() => {
                skipped += 1;
                warn!(error = %e, "skipping roster record");
            }
            Err(e) => return Err(e.into()),
        }
    }
    let snapshot = Snapshot::build(dim, records, captured_at)?;
    Ok((snapshot, skipped))
}

/// Pulls the roster from a [`DirectorySource`] into an [`IdentityCache`].
#[derive(Clone)]
pub struct CacheRefresher {
    cache: Arc<IdentityCache>,
    source: Arc<dyn DirectorySource>,
    retry: RetryPolicy,
}

impl CacheRefresher {
    pub fn new(cache: Arc<IdentityCache>, source: Arc<dyn DirectorySource>, retry: RetryPolicy) -> Self {
        Self { cache, source, retry }
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// Fetches, validates and installs a fresh roster.
    ///
    /// On any fetch failure the active snapshot is left untouched, so
    /// matching keeps working on the last good roster. A successful fetch
    /// of zero valid records installs an empty snapshot.
    pub async fn refresh(&self) -> Result<RefreshReport, MonitorError> {
        let start = Instant::now();
        debug!(dim = self.cache.dim(), "refreshing roster");
        let source = &self.source;
        let raw = match retry(&self.retry, "fetch_roster", move |_| source.fetch_roster()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "roster refresh failed, keeping previous snapshot");
                return Err(e.into());
            }
        };

        let fetched = raw.len();
        let (snapshot, skipped) = build_snapshot(self.cache.dim(), raw, Utc::now())?;
        let installed = snapshot.len();
        self.cache.replace(snapshot)?;

        let report = RefreshReport {
            fetched,
            installed,
            skipped,
            elapsed: start.elapsed(),
        };
        info!(
            fetched,
            installed,
            skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "roster refreshed"
        );
        Ok(report)
    }
}

type Reply = oneshot::Sender<Result<RefreshReport, MonitorError>>;

/// Handle to a running refresher task.
///
/// Cloning is cheap. When every handle is dropped the task exits.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Option<Reply>>,
}

impl RefreshHandle {
    /// Asks for a refresh without waiting.
    ///
    /// Returns false if a request is already queued or the task stopped;
    /// either way the caller is never blocked. Concurrent triggers while a
    /// request is queued collapse into that one request.
    pub fn trigger(&self) -> bool {
        self.tx.try_send(None).is_ok()
    }

    /// Requests a refresh and waits for its outcome.
    pub async fn refresh(&self) -> Result<RefreshReport, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Some(reply))
            .await
            .map_err(|_| MonitorError::RefresherStopped)?;
        rx.await.map_err(|_| MonitorError::RefresherStopped)?
    }
}

/// Spawns the refresher task.
///
/// The first interval tick fires immediately and performs the initial
/// load. Triggered refreshes push the next scheduled tick out by a full
/// interval. A refresh in progress when `cancel` fires runs to completion.
pub fn spawn_refresher(
    refresher: CacheRefresher,
    interval: Duration,
    cancel: CancellationToken,
) -> (RefreshHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let task = tokio::spawn(run(refresher, interval, rx, cancel));
    (RefreshHandle { tx }, task)
}

async fn run(
    refresher: CacheRefresher,
    interval: Duration,
    mut rx: mpsc::Receiver<Option<Reply>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis() as u64, "roster refresher started");

    loop {
        let (reply, scheduled) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => (None, true),
            req = rx.recv() => match req {
                Some(reply) => (reply, false),
                None => break,
            },
        };

        if !scheduled {
            debug!("on-demand roster refresh");
        }
        // Failures are logged inside refresh().
        let result = refresher.refresh().await;
        if !scheduled {
            ticker.reset();
        }
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    info!("roster refresher stopped");
}
