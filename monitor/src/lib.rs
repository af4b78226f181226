//! Roster refresh, live matching and presence tracking as one service.
//!
//! [`Monitor::start`] spawns two background tasks: a refresher that keeps
//! the identity roster current (periodically, and on demand when a
//! request finds it stale) and a sweeper that evicts identities whose
//! presence window has lapsed. Request handlers call the [`Monitor`]
//! directly; none of its operations wait on the directory.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use floorwatch_directory::HttpDirectory;
//! use floorwatch_monitor::{Monitor, MonitorConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(HttpDirectory::new("http://directory.local")?);
//! let (monitor, tasks) = Monitor::start(MonitorConfig::default(), source);
//!
//! let probe = vec![0.0f32; 512];
//! let seen = monitor.observe(&probe, 3, "lobby-cam", None)?;
//! println!("arrival={} notify={}", seen.arrival, seen.notify);
//!
//! tasks.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod arrivals;
mod config;
mod error;
mod locations;
mod monitor;
mod refresher;
mod sweeper;

#[cfg(test)]
mod tests;

pub use arrivals::ArrivalGate;
pub use config::{
    DEFAULT_ARRIVAL_COOLDOWN, DEFAULT_DIM, DEFAULT_REFRESH_INTERVAL, DEFAULT_STALE_THRESHOLD,
    DEFAULT_SWEEP_INTERVAL, MonitorConfig,
};
pub use error::MonitorError;
pub use locations::{LocationChange, LocationMap, Reassignment};
pub use monitor::{
    DuplicateCheck, Identification, MatchedIdentity, Monitor, MonitorStatus, MonitorTasks,
    Observation,
};
pub use refresher::{
    CacheRefresher, RefreshHandle, RefreshReport, build_snapshot, spawn_refresher,
};
pub use sweeper::spawn_sweeper;
