use std::time::{Duration, Instant};

/// Fixed-interval replan trigger driven by the control tick.
///
/// Fires at most once per poll; fires missed while the tick was late are
/// skipped instead of queued.
#[derive(Debug, Clone)]
pub struct ReplanTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl ReplanTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next: None }
    }

    pub fn arm(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(mut next) = self.next else {
            return false;
        };
        if now < next {
            return false;
        }
        while next <= now {
            next += self.interval;
        }
        self.next = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_at_interval() {
        let t0 = Instant::now();
        let mut timer = ReplanTimer::new(Duration::from_secs(2));
        assert!(!timer.poll(t0 + Duration::from_secs(5)));

        timer.arm(t0);
        assert!(!timer.poll(t0 + Duration::from_millis(1999)));
        assert!(timer.poll(t0 + Duration::from_secs(2)));
        assert!(!timer.poll(t0 + Duration::from_secs(3)));
        // late tick: one fire, missed ones dropped
        assert!(timer.poll(t0 + Duration::from_secs(9)));
        assert!(!timer.poll(t0 + Duration::from_millis(9500)));
        assert!(timer.poll(t0 + Duration::from_secs(10)));

        timer.disarm();
        assert!(!timer.poll(t0 + Duration::from_secs(100)));
    }
}
