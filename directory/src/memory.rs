use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::DirectoryError;
use crate::record::RawRecord;
use crate::source::DirectorySource;

/// In-memory [`DirectorySource`]. Intended for testing and local runs.
///
/// Entries are held in wire form, so a roster loaded with
/// [`MemoryDirectory::from_values`] may contain malformed entries exactly as
/// an HTTP directory could. Failures can be injected to exercise the retry
/// and stale-cache paths.
pub struct MemoryDirectory {
    inner: Mutex<MemoryDirectoryInner>,
}

struct MemoryDirectoryInner {
    entries: Vec<Value>,
    fail_next: u32,
    unavailable: bool,
    latency: Duration,
    calls: u32,
}

impl MemoryDirectory {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self::from_values(records.iter().map(RawRecord::to_value).collect())
    }

    /// Serves `entries` verbatim, without validating them.
    pub fn from_values(entries: Vec<Value>) -> Self {
        Self {
            inner: Mutex::new(MemoryDirectoryInner {
                entries,
                fail_next: 0,
                unavailable: false,
                latency: Duration::ZERO,
                calls: 0,
            }),
        }
    }

    /// Replaces the roster served by subsequent fetches.
    pub fn set_records(&self, records: Vec<RawRecord>) {
        self.set_values(records.iter().map(RawRecord::to_value).collect());
    }

    /// Like [`MemoryDirectory::set_records`], with entries served verbatim.
    pub fn set_values(&self, entries: Vec<Value>) {
        self.inner.lock().entries = entries;
    }

    /// Makes the next `n` fetches fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().fail_next = n;
    }

    /// Makes every fetch fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Delays every fetch by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Number of fetch attempts served so far.
    pub fn calls(&self) -> u32 {
        self.inner.lock().calls
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait::async_trait]
impl DirectorySource for MemoryDirectory {
    async fn fetch_roster(&self) -> Result<Vec<Value>, DirectoryError> {
        let latency = {
            let mut inner = self.inner.lock();
            inner.calls += 1;
            inner.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(DirectoryError::Request("memory directory unavailable".into()));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(DirectoryError::Request("memory directory injected failure".into()));
        }
        Ok(inner.entries.clone())
    }
}
