//! PID loop on an error signal.

#[derive(Debug, Clone)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    last_error: Option<f64>,
    /// Symmetric output limit, also bounds the integral contribution
    limit: f64,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            last_error: None,
            limit: f64::INFINITY,
        }
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = limit.abs();
        self
    }

    /// One step for `error` over `dt` seconds. A non-positive `dt` returns 0 and
    /// leaves the state untouched.
    pub fn step(&mut self, error: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }

        let p = self.kp * error;

        self.integral += error * dt;
        let i = (self.ki * self.integral).clamp(-self.limit, self.limit);
        // anti-windup: keep the accumulator consistent with the clamped term
        if self.ki.abs() > f64::EPSILON {
            self.integral = i / self.ki;
        }

        let d = match self.last_error {
            Some(prev) => self.kd * (error - prev) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        (p + i + d).clamp(-self.limit, self.limit)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let mut pid = Pid::new(2.0, 0.0, 0.0);
        assert!((pid.step(10.0, 0.1) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_limited() {
        let mut pid = Pid::new(100.0, 0.0, 0.0).with_limit(1.0);
        assert_eq!(pid.step(1.0, 0.01), 1.0);
        assert_eq!(pid.step(-1.0, 0.01), -1.0);
    }

    #[test]
    fn test_integral_and_reset() {
        let mut pid = Pid::new(0.0, 1.0, 0.0);
        pid.step(1.0, 0.5);
        assert!((pid.step(1.0, 0.5) - 1.0).abs() < 1e-9);
        pid.reset();
        assert!((pid.step(1.0, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_dt() {
        let mut pid = Pid::new(1.0, 1.0, 1.0);
        assert_eq!(pid.step(5.0, 0.0), 0.0);
        let mut fresh = Pid::new(1.0, 1.0, 1.0);
        assert!((pid.step(5.0, 0.1) - fresh.step(5.0, 0.1)).abs() < 1e-9);
    }
}
