//! Elapsed-time pseudo-callbacks.
//!
//! Boundaries are counted from a fixed start instant, so a late tick catches
//! up: a timer that crossed k boundaries since the previous tick fires k times.

use std::time::{Duration, Instant};

pub const TIMER_ONE_SECOND: &str = "Timer.OneSecond";
pub const TIMER_FIVE_SECONDS: &str = "Timer.FiveSeconds";
pub const TIMER_ONE_MINUTE: &str = "Timer.OneMinute";

struct Timer {
    name: &'static str,
    period: Duration,
    fired: u64,
}

impl Timer {
    fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            fired: 0,
        }
    }
}

/// Fixed set of periodic timers anchored at one start instant.
pub struct TimerSchedule {
    start: Instant,
    timers: Vec<Timer>,
}

impl TimerSchedule {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            timers: vec![
                Timer::new(TIMER_ONE_SECOND, Duration::from_secs(1)),
                Timer::new(TIMER_FIVE_SECONDS, Duration::from_secs(5)),
                Timer::new(TIMER_ONE_MINUTE, Duration::from_secs(60)),
            ],
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Names of the timers due at `now`, one entry per crossed boundary.
    ///
    /// An instant earlier than the last one seen yields nothing.
    pub fn due(&mut self, now: Instant) -> Vec<&'static str> {
        let elapsed = now.saturating_duration_since(self.start).as_millis();
        let mut due = Vec::new();

        for timer in &mut self.timers {
            let boundaries = (elapsed / timer.period.as_millis()) as u64;
            if boundaries > timer.fired {
                let k = boundaries - timer.fired;
                timer.fired = boundaries;
                due.extend(std::iter::repeat(timer.name).take(k as usize));
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(due: &[&str], name: &str) -> usize {
        due.iter().filter(|n| **n == name).count()
    }

    #[test]
    fn test_nothing_due_before_first_boundary() {
        let start = Instant::now();
        let mut schedule = TimerSchedule::new(start);
        assert!(schedule.due(start + Duration::from_millis(999)).is_empty());
    }

    #[test]
    fn test_k_boundaries_fire_k_times() {
        let start = Instant::now();
        for k in 1..=12u64 {
            let mut schedule = TimerSchedule::new(start);
            let due = schedule.due(start + Duration::from_millis(k * 1000 + 10));
            assert_eq!(count(&due, TIMER_ONE_SECOND), k as usize, "k = {}", k);
            assert_eq!(count(&due, TIMER_FIVE_SECONDS), (k / 5) as usize);
        }
    }

    #[test]
    fn test_each_boundary_fires_once_across_ticks() {
        let start = Instant::now();
        let mut schedule = TimerSchedule::new(start);

        let mut total = 0;
        // Irregular tick spacing over 61.5 seconds.
        let mut at = 0u64;
        for step in [300u64, 700, 2500, 40, 9000, 1, 48_959] {
            at += step;
            let due = schedule.due(start + Duration::from_millis(at));
            total += count(&due, TIMER_ONE_SECOND);
        }
        assert_eq!(at, 61_500);
        assert_eq!(total, 61);

        let due = schedule.due(start + Duration::from_millis(at));
        assert!(due.is_empty());
    }

    #[test]
    fn test_minute_timer() {
        let start = Instant::now();
        let mut schedule = TimerSchedule::new(start);

        let due = schedule.due(start + Duration::from_secs(125));
        assert_eq!(count(&due, TIMER_ONE_MINUTE), 2);
        assert_eq!(count(&due, TIMER_FIVE_SECONDS), 25);
        assert_eq!(count(&due, TIMER_ONE_SECOND), 125);
    }

    #[test]
    fn test_clock_going_backwards_is_ignored() {
        let start = Instant::now();
        let mut schedule = TimerSchedule::new(start);

        assert_eq!(schedule.due(start + Duration::from_secs(3)).len(), 3);
        assert!(schedule.due(start + Duration::from_secs(1)).is_empty());
        assert_eq!(schedule.due(start + Duration::from_secs(4)).len(), 1);
    }
}
