use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Rate-limits arrival notifications per location.
///
/// The first arrival at a location notifies. Later arrivals notify only
/// once more than `cooldown` has passed since the last notification there.
#[derive(Debug)]
pub struct ArrivalGate {
    cooldown: TimeDelta,
    last: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl ArrivalGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX),
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_notify(&self, location_id: i64) -> bool {
        self.should_notify_at(location_id, Utc::now())
    }

    /// Decides at `now` and, if it says yes, records `now` as the
    /// location's last notification.
    pub fn should_notify_at(&self, location_id: i64, now: DateTime<Utc>) -> bool {
        let mut last = self.last.lock();
        match last.get(&location_id) {
            Some(&prev) if now - prev <= self.cooldown => false,
            _ => {
                last.insert(location_id, now);
                true
            }
        }
    }

    /// Forgets the location's last notification.
    pub fn reset(&self, location_id: i64) {
        self.last.lock().remove(&location_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_per_location() {
        let gate = ArrivalGate::new(Duration::from_secs(300));
        let t0 = Utc::now();

        assert!(gate.should_notify_at(1, t0));
        assert!(!gate.should_notify_at(1, t0 + TimeDelta::seconds(10)));
        assert!(gate.should_notify_at(2, t0 + TimeDelta::seconds(10)));
        assert!(!gate.should_notify_at(1, t0 + TimeDelta::seconds(300)));
        assert!(gate.should_notify_at(1, t0 + TimeDelta::seconds(301)));
        // The window restarts from the last notification.
        assert!(!gate.should_notify_at(1, t0 + TimeDelta::seconds(400)));
    }

    #[test]
    fn zero_cooldown_always_notifies() {
        let gate = ArrivalGate::new(Duration::ZERO);
        let t0 = Utc::now();
        assert!(gate.should_notify_at(1, t0));
        assert!(gate.should_notify_at(1, t0 + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn reset_reopens_location() {
        let gate = ArrivalGate::new(Duration::from_secs(300));
        let t0 = Utc::now();
        assert!(gate.should_notify_at(1, t0));
        gate.reset(1);
        assert!(gate.should_notify_at(1, t0 + TimeDelta::seconds(1)));
    }
}
