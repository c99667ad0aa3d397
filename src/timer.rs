use chrono::{DateTime, Utc};

/// Opaque token for one armed delay. Disarming with a stale token is a
/// no-op, so holders never race a fire that already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct TimerEntry {
    token: u64,
    pr_id: u64,
    fires_at: DateTime<Utc>,
}

/// Cooperative single-thread timer queue.
///
/// Nothing fires on its own: the event loop calls `pop_due` each
/// iteration and runs the resulting actions itself. Precision is
/// therefore "no earlier than", bounded by the loop's poll interval.
/// Cancellation and firing both run on the loop thread and can never
/// overlap.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_token: u64,
    armed: Vec<TimerEntry>,
}

impl TimerQueue {
    /// Arms a delay that expires at `fires_at` for the given record.
    pub fn arm(&mut self, pr_id: u64, fires_at: DateTime<Utc>) -> TimerHandle {
        let token = self.next_token;
        self.next_token += 1;
        self.armed.push(TimerEntry {
            token,
            pr_id,
            fires_at,
        });
        TimerHandle(token)
    }

    /// Disarms a pending delay. Returns false if it already fired or was
    /// already cancelled.
    pub fn disarm(&mut self, handle: TimerHandle) -> bool {
        let before = self.armed.len();
        self.armed.retain(|entry| entry.token != handle.0);
        self.armed.len() < before
    }

    /// Removes and returns the record ids of every expired delay,
    /// earliest deadline first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<u64> {
        let mut due: Vec<TimerEntry> = Vec::new();
        self.armed.retain(|entry| {
            if entry.fires_at <= now {
                due.push(entry.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|entry| entry.fires_at);
        due.into_iter().map(|entry| entry.pr_id).collect()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.armed.iter().map(|entry| entry.fires_at).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn due_entries_pop_once_in_deadline_order() {
        let now = Utc::now();
        let mut timers = TimerQueue::default();
        timers.arm(1, now + Duration::seconds(30));
        timers.arm(2, now + Duration::seconds(10));
        timers.arm(3, now + Duration::seconds(90));

        assert!(timers.pop_due(now).is_empty());
        assert_eq!(
            timers.pop_due(now + Duration::seconds(60)),
            vec![2, 1]
        );
        assert!(timers.pop_due(now + Duration::seconds(60)).is_empty());
        assert_eq!(timers.pop_due(now + Duration::seconds(120)), vec![3]);
    }

    #[test]
    fn disarm_prevents_firing() {
        let now = Utc::now();
        let mut timers = TimerQueue::default();
        let handle = timers.arm(1, now + Duration::seconds(5));

        assert!(timers.disarm(handle));
        assert!(timers.pop_due(now + Duration::seconds(10)).is_empty());
        assert!(!timers.disarm(handle));
    }

    #[test]
    fn disarm_after_fire_is_a_noop() {
        let now = Utc::now();
        let mut timers = TimerQueue::default();
        let handle = timers.arm(7, now - Duration::seconds(1));

        assert_eq!(timers.pop_due(now), vec![7]);
        assert!(!timers.disarm(handle));
    }

    #[test]
    fn next_deadline_tracks_the_earliest_entry() {
        let now = Utc::now();
        let mut timers = TimerQueue::default();
        assert!(timers.next_deadline().is_none());

        timers.arm(1, now + Duration::seconds(30));
        timers.arm(2, now + Duration::seconds(10));
        assert_eq!(timers.next_deadline(), Some(now + Duration::seconds(10)));
    }
}
