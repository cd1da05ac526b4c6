//! Quiet-period debouncing for bursts of filesystem notifications.
//!
//! Every `notify` restarts the countdown. Once `quiet` elapses with no
//! further notification, the next `poll` hands back everything collected
//! since the previous firing, exactly once. There is no maximum-wait cap:
//! sustained traffic postpones firing indefinitely.
//!
//! The debouncer owns no timer thread. The host polls it once per tick;
//! `notify_at`/`poll_at` take explicit instants for deterministic tests.

use std::time::{Duration, Instant};

/// Accumulates items until the stream has been quiet for `quiet`.
#[derive(Debug)]
pub struct ChangeDebouncer<T> {
    quiet: Duration,
    pending: Vec<T>,
    last_notify: Option<Instant>,
}

impl<T> ChangeDebouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        ChangeDebouncer {
            quiet,
            pending: Vec::new(),
            last_notify: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record an item and restart the countdown.
    pub fn notify(&mut self, item: T) {
        self.notify_at(item, Instant::now());
    }

    pub fn notify_at(&mut self, item: T, now: Instant) {
        self.pending.push(item);
        // out-of-order instants never move the deadline backwards
        self.last_notify = Some(match self.last_notify {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    /// Returns the settled batch if the quiet period has elapsed.
    pub fn poll(&mut self) -> Option<Vec<T>> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<Vec<T>> {
        let last = self.last_notify?;
        if now.saturating_duration_since(last) < self.quiet {
            return None;
        }
        self.last_notify = None;
        Some(std::mem::take(&mut self.pending))
    }

    /// When the pending batch will settle if nothing else arrives.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_notify.map(|t| t + self.quiet)
    }

    pub fn is_pending(&self) -> bool {
        self.last_notify.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything collected so far without firing.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_notify = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_fires_once_after_last_notification() {
        let t0 = Instant::now();
        let mut d = ChangeDebouncer::new(ms(100));
        d.notify_at("a", t0);
        d.notify_at("b", t0 + ms(50));
        d.notify_at("c", t0 + ms(90));

        assert!(d.poll_at(t0 + ms(100)).is_none());
        assert!(d.poll_at(t0 + ms(150)).is_none());
        assert!(d.poll_at(t0 + ms(189)).is_none());
        assert_eq!(d.poll_at(t0 + ms(190)), Some(vec!["a", "b", "c"]));
        // fired exactly once
        assert!(d.poll_at(t0 + ms(400)).is_none());
        assert!(!d.is_pending());
    }

    #[test]
    fn idle_debouncer_never_fires() {
        let mut d: ChangeDebouncer<u32> = ChangeDebouncer::new(ms(10));
        assert!(d.poll_at(Instant::now() + ms(1000)).is_none());
        assert!(d.deadline().is_none());
    }

    #[test]
    fn deadline_tracks_latest_notification() {
        let t0 = Instant::now();
        let mut d = ChangeDebouncer::new(ms(100));
        d.notify_at(1, t0 + ms(30));
        d.notify_at(2, t0);
        assert_eq!(d.deadline(), Some(t0 + ms(130)));
        assert_eq!(d.pending_len(), 2);
    }

    #[test]
    fn clear_discards_without_firing() {
        let t0 = Instant::now();
        let mut d = ChangeDebouncer::new(ms(5));
        d.notify_at(1, t0);
        d.clear();
        assert!(d.poll_at(t0 + ms(50)).is_none());
    }

    #[test]
    fn second_burst_is_independent() {
        let t0 = Instant::now();
        let mut d = ChangeDebouncer::new(ms(20));
        d.notify_at(1, t0);
        assert_eq!(d.poll_at(t0 + ms(20)), Some(vec![1]));
        d.notify_at(2, t0 + ms(30));
        assert!(d.poll_at(t0 + ms(40)).is_none());
        assert_eq!(d.poll_at(t0 + ms(50)), Some(vec![2]));
    }
}
