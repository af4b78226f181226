use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use floorwatch_directory::DirectorySource;
use floorwatch_identity::{BestMatch, IdentityCache, IdentityRecord, Metadata, SimilarityMatcher};
use floorwatch_presence::{PresenceEntry, PresenceTracker};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arrivals::ArrivalGate;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::locations::{LocationMap, Reassignment};
use crate::refresher::{CacheRefresher, RefreshHandle, RefreshReport, spawn_refresher};
use crate::sweeper::spawn_sweeper;

/// A roster entry that cleared a threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedIdentity {
    pub id: i64,
    pub display_name: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl MatchedIdentity {
    fn from_record(record: &IdentityRecord, score: f32) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name.clone(),
            metadata: record.metadata.clone(),
            score,
        }
    }

    fn from_best(best: &BestMatch<'_>) -> Option<Self> {
        best.record.map(|r| Self::from_record(r, best.score))
    }
}

/// Outcome of a registration-time duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCheck {
    pub duplicate: Option<MatchedIdentity>,
    pub best_score: f32,
    /// Roster size the probe was compared against.
    pub compared: usize,
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate.is_some()
    }
}

/// Outcome of a live identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    pub identity: Option<MatchedIdentity>,
    pub best_score: f32,
    pub threshold: f32,
}

/// Outcome of a live sighting: who it was, and what it did to presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub location_id: i64,
    pub source: String,
    /// Detector confidence as reported with the probe; informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub identification: Identification,
    /// The identity was not present at the location before this sighting.
    pub arrival: bool,
    /// The arrival should be forwarded to alerting.
    pub notify: bool,
}

/// Health summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub roster_size: usize,
    pub dim: usize,
    pub captured_at: Option<DateTime<Utc>>,
    /// Seconds since the active roster was fetched; absent before the
    /// first successful load.
    pub cache_age_secs: Option<f64>,
    pub stale: bool,
    pub present: usize,
    pub sources: usize,
}

/// Background tasks started by [`Monitor::start`].
pub struct MonitorTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorTasks {
    /// Stops the refresher and sweeper and waits for both to exit.
    ///
    /// A refresh already in flight is allowed to finish and install.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("monitor stopped");
    }
}

/// Matching and presence front end shared by request handlers.
///
/// Every operation reads the roster snapshot active at call time; if that
/// roster is older than the stale threshold the refresher is nudged
/// without waiting on it.
pub struct Monitor {
    config: MonitorConfig,
    cache: Arc<IdentityCache>,
    tracker: Arc<PresenceTracker>,
    matcher: SimilarityMatcher,
    arrivals: ArrivalGate,
    locations: LocationMap,
    refresh: RefreshHandle,
}

impl Monitor {
    /// Spawns the refresher and sweeper and returns the monitor with a
    /// handle to stop them. Must be called inside a tokio runtime.
    pub fn start(config: MonitorConfig, source: Arc<dyn DirectorySource>) -> (Self, MonitorTasks) {
        let config = config.with_defaults();
        let cache = Arc::new(IdentityCache::new(config.dim));
        let tracker = Arc::new(PresenceTracker::new(config.presence_timeout));
        let cancel = CancellationToken::new();

        let refresher = CacheRefresher::new(cache.clone(), source, config.retry);
        let (refresh, refresh_task) =
            spawn_refresher(refresher, config.refresh_interval, cancel.child_token());
        let sweep_task = spawn_sweeper(tracker.clone(), config.sweep_interval, cancel.child_token());

        info!(
            dim = config.dim,
            duplicate_threshold = config.thresholds.duplicate,
            identify_threshold = config.thresholds.identify,
            "monitor started"
        );

        let monitor = Self {
            matcher: SimilarityMatcher::new(config.thresholds),
            arrivals: ArrivalGate::new(config.arrival_cooldown),
            locations: LocationMap::new(),
            config,
            cache,
            tracker,
            refresh,
        };
        let tasks = MonitorTasks {
            cancel,
            handles: vec![refresh_task, sweep_task],
        };
        (monitor, tasks)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<PresenceTracker> {
        &self.tracker
    }

    pub fn locations(&self) -> &LocationMap {
        &self.locations
    }

    /// Replaces source assignments in bulk; see [`LocationMap::reassign`].
    pub fn reassign_sources(&self, assignments: impl IntoIterator<Item = (String, i64)>) -> Reassignment {
        let r = self.locations.reassign(assignments);
        for change in &r.updated {
            info!(source = %change.source, from = change.from, to = change.to, "source reassigned");
        }
        r
    }

    /// Drops a source's location assignment. Returns the location it had.
    pub fn remove_source(&self, source: &str) -> Option<i64> {
        let removed = self.locations.remove(source);
        match removed {
            Some(location_id) => info!(source, location_id, "source removed"),
            None => debug!(source, "remove for unassigned source"),
        }
        removed
    }

    fn nudge_if_stale(&self) {
        if !self.cache.is_stale(self.config.stale_threshold) {
            return;
        }
        if self.refresh.trigger() {
            debug!("roster stale, refresh requested");
        } else {
            debug!("roster stale, refresh already pending");
        }
    }

    /// Refreshes the roster now and waits for the result.
    pub async fn refresh(&self) -> Result<RefreshReport, MonitorError> {
        self.refresh.refresh().await
    }

    /// Checks whether `probe` belongs to someone already on the roster,
    /// using the strict duplicate threshold.
    pub fn check_duplicate(&self, probe: &[f32]) -> Result<DuplicateCheck, MonitorError> {
        self.nudge_if_stale();
        let snapshot = self.cache.get();
        let best = self.matcher.check_duplicate(probe, &snapshot)?;
        Ok(DuplicateCheck {
            duplicate: MatchedIdentity::from_best(&best),
            best_score: best.score,
            compared: snapshot.len(),
        })
    }

    /// Recognizes `probe` against the roster using the identify threshold.
    pub fn identify(&self, probe: &[f32]) -> Result<Identification, MonitorError> {
        self.nudge_if_stale();
        let snapshot = self.cache.get();
        let best = self.matcher.identify(probe, &snapshot)?;
        Ok(Identification {
            identity: MatchedIdentity::from_best(&best),
            best_score: best.score,
            threshold: self.matcher.thresholds().identify,
        })
    }

    /// Identifies a live sighting and, on a match, marks the identity
    /// present at `location_id`.
    pub fn observe(
        &self,
        probe: &[f32],
        location_id: i64,
        source: &str,
        confidence: Option<f32>,
    ) -> Result<Observation, MonitorError> {
        let identification = self.identify(probe)?;

        let mut arrival = false;
        let mut notify = false;
        if let Some(who) = &identification.identity {
            arrival = self
                .tracker
                .update(who.id, location_id, source, who.score)
                .is_arrival();
            if arrival {
                notify = self.arrivals.should_notify(location_id);
                info!(
                    identity_id = who.id,
                    name = %who.display_name,
                    location_id,
                    source,
                    score = who.score,
                    notify,
                    "identity arrived"
                );
            }
        }

        Ok(Observation {
            location_id,
            source: source.to_string(),
            confidence,
            identification,
            arrival,
            notify,
        })
    }

    /// Like [`Monitor::observe`], with the location looked up from the
    /// source's assignment.
    pub fn observe_from_source(
        &self,
        probe: &[f32],
        source: &str,
        confidence: Option<f32>,
    ) -> Result<Observation, MonitorError> {
        let location_id = self
            .locations
            .location_of(source)
            .ok_or_else(|| MonitorError::UnknownSource(source.to_string()))?;
        self.observe(probe, location_id, source, confidence)
    }

    /// Identities present at `location_id`.
    pub fn present(&self, location_id: i64) -> Vec<PresenceEntry> {
        self.tracker.list_present(location_id)
    }

    /// Every location with at least one identity present.
    pub fn occupancy(&self) -> BTreeMap<i64, Vec<PresenceEntry>> {
        self.tracker.occupancy()
    }

    /// Empties a location and re-arms its arrival notification. Returns
    /// how many entries were dropped.
    pub fn clear_location(&self, location_id: i64) -> usize {
        let n = self.tracker.clear_location(location_id);
        self.arrivals.reset(location_id);
        info!(location_id, removed = n, "location cleared");
        n
    }

    pub fn status(&self) -> MonitorStatus {
        let snapshot = self.cache.get();
        let now = Utc::now();
        MonitorStatus {
            roster_size: snapshot.len(),
            dim: snapshot.dim(),
            captured_at: snapshot.captured_at(),
            cache_age_secs: snapshot
                .captured_at()
                .map(|_| snapshot.age_at(now).as_secs_f64()),
            stale: self.cache.is_stale_at(self.config.stale_threshold, now),
            present: self.tracker.total_at(now),
            sources: self.locations.len(),
        }
    }
}
