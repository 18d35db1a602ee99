//! Virtual clock and deterministic timer wheel.
//!
//! Simulation time only moves when the owner calls `advance`; nothing here
//! touches the wall clock. Timers fire in (due-time, registration) order, so
//! a run replays identically regardless of host scheduling. MAC aging, STP
//! advancement, and the DHCP T1/T2/expiry timers all ride this wheel.

/// Monotonic virtual clock, millisecond resolution.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    now_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self { now_ms: 0 }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Move the clock forward to `target_ms`. Moving backwards is a no-op.
    pub fn advance_to(&mut self, target_ms: u64) {
        if target_ms > self.now_ms {
            self.now_ms = target_ms;
        }
    }
}

/// One scheduled timer. `period_ms` is set for recurring timers.
#[derive(Debug, Clone)]
pub struct TimerEntry<K> {
    pub id: u64,
    pub due_ms: u64,
    pub period_ms: Option<u64>,
    pub kind: K,
}

/// Deterministic timer wheel keyed by virtual due-time.
///
/// Entries are kept unsorted and scanned on pop; the wheel holds at most a
/// handful of timers per device, so a scan beats maintaining a heap under
/// frequent cancellation.
#[derive(Debug, Default)]
pub struct TimerWheel<K> {
    entries: Vec<TimerEntry<K>>,
    next_id: u64,
}

impl<K: Clone> TimerWheel<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedule a one-shot timer `delay_ms` from `now_ms`. Returns its id.
    pub fn schedule_in(&mut self, now_ms: u64, delay_ms: u64, kind: K) -> u64 {
        self.push(now_ms.saturating_add(delay_ms), None, kind)
    }

    /// Schedule a recurring timer with the given period. First fire is one
    /// full period from `now_ms`.
    pub fn schedule_every(&mut self, now_ms: u64, period_ms: u64, kind: K) -> u64 {
        let period = period_ms.max(1);
        self.push(now_ms.saturating_add(period), Some(period), kind)
    }

    fn push(&mut self, due_ms: u64, period_ms: Option<u64>, kind: K) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            due_ms,
            period_ms,
            kind,
        });
        id
    }

    /// Cancel a timer by id. Returns whether it existed.
    pub fn cancel(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Cancel every timer whose kind matches the predicate.
    pub fn cancel_matching<F: Fn(&K) -> bool>(&mut self, pred: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(&e.kind));
        before - self.entries.len()
    }

    /// Earliest due-time currently scheduled.
    pub fn next_due(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.due_ms).min()
    }

    /// Remove and return the earliest entry due at or before `now_ms`.
    /// Ties break by registration order. Recurring timers are re-armed
    /// relative to their previous due time, so periods do not drift.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerEntry<K>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= now_ms)
            .min_by_key(|(_, e)| (e.due_ms, e.id))
            .map(|(i, _)| i)?;
        let entry = self.entries.remove(idx);
        if let Some(period) = entry.period_ms {
            self.entries.push(TimerEntry {
                id: entry.id,
                due_ms: entry.due_ms + period,
                period_ms: Some(period),
                kind: entry.kind.clone(),
            });
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero_and_advances() {
        let mut clock = Clock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance_to(1500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut clock = Clock::new();
        clock.advance_to(1000);
        clock.advance_to(400);
        assert_eq!(clock.now_ms(), 1000, "advance_to a past instant is a no-op");
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::new();
        wheel.schedule_in(0, 500, "t1");

        assert!(wheel.pop_due(499).is_none(), "not due yet");
        let fired = wheel.pop_due(500).expect("due at 500");
        assert_eq!(fired.kind, "t1");
        assert!(wheel.pop_due(10_000).is_none(), "one-shot must not re-arm");
    }

    #[test]
    fn test_recurring_rearms_without_drift() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::new();
        wheel.schedule_every(0, 1000, "tick");

        // Pop late, at t=2500: first fire was due at 1000; the re-arm must be
        // at 2000 (relative to the previous due time), not at 3500.
        let first = wheel.pop_due(2500).unwrap();
        assert_eq!(first.due_ms, 1000);
        let second = wheel.pop_due(2500).unwrap();
        assert_eq!(second.due_ms, 2000, "period is anchored to due time");
    }

    #[test]
    fn test_pop_order_is_due_then_registration() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::new();
        wheel.schedule_in(0, 100, "late");
        wheel.schedule_in(0, 50, "early");
        wheel.schedule_in(0, 50, "early2");

        assert_eq!(wheel.pop_due(200).unwrap().kind, "early");
        assert_eq!(wheel.pop_due(200).unwrap().kind, "early2");
        assert_eq!(wheel.pop_due(200).unwrap().kind, "late");
    }

    #[test]
    fn test_cancel_by_id() {
        let mut wheel: TimerWheel<&'static str> = TimerWheel::new();
        let id = wheel.schedule_in(0, 100, "gone");
        assert!(wheel.cancel(id));
        assert!(!wheel.cancel(id), "second cancel finds nothing");
        assert!(wheel.pop_due(1000).is_none());
    }

    #[test]
    fn test_cancel_matching_predicate() {
        let mut wheel: TimerWheel<(u32, &'static str)> = TimerWheel::new();
        wheel.schedule_in(0, 10, (1, "a"));
        wheel.schedule_in(0, 20, (1, "b"));
        wheel.schedule_in(0, 30, (2, "c"));

        let removed = wheel.cancel_matching(|k| k.0 == 1);
        assert_eq!(removed, 2);
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.pop_due(100).unwrap().kind, (2, "c"));
    }

    #[test]
    fn test_next_due_reports_earliest() {
        let mut wheel: TimerWheel<u8> = TimerWheel::new();
        assert_eq!(wheel.next_due(), None);
        wheel.schedule_in(0, 300, 1);
        wheel.schedule_in(0, 100, 2);
        assert_eq!(wheel.next_due(), Some(100));
    }
}
