use std::time::{Duration, Instant};

/// 单次计时器 - 用于限定采样窗口
///
/// `elapsed` 每次调用都会重置参考点（无论结果如何）。
#[derive(Debug, Clone)]
pub struct ElapsedTimer {
    duration: Duration,
    reference: Instant,
}

impl ElapsedTimer {
    pub fn new(duration: Duration) -> Self {
        Self::starting_at(duration, Instant::now())
    }

    pub fn starting_at(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            reference: now,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn elapsed(&mut self) -> bool {
        self.elapsed_at(Instant::now())
    }

    /// Returns whether `duration` has passed since the reference point and
    /// moves the reference point to `now`.
    pub fn elapsed_at(&mut self, now: Instant) -> bool {
        let result = self.is_elapsed_at(now);
        self.reference = now;
        result
    }

    /// Same check as [`elapsed_at`](Self::elapsed_at) without touching the
    /// reference point.
    pub fn is_elapsed_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.reference) >= self.duration
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.reference = now;
    }
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_elapsed_before_duration() {
        let start = Instant::now();
        let mut timer = ElapsedTimer::starting_at(Duration::from_millis(100), start);

        assert!(!timer.elapsed_at(start + Duration::from_millis(99)));
    }

    #[test]
    fn test_elapsed_at_and_after_duration() {
        let start = Instant::now();
        let mut timer = ElapsedTimer::starting_at(Duration::from_millis(100), start);
        assert!(timer.elapsed_at(start + Duration::from_millis(100)));

        let mut timer = ElapsedTimer::starting_at(Duration::from_millis(100), start);
        assert!(timer.elapsed_at(start + Duration::from_millis(250)));
    }

    #[test]
    fn test_elapsed_always_resets_reference() {
        let start = Instant::now();
        let mut timer = ElapsedTimer::starting_at(Duration::from_millis(100), start);

        // 未到期的调用同样会重置参考点
        assert!(!timer.elapsed_at(start + Duration::from_millis(60)));
        assert!(!timer.elapsed_at(start + Duration::from_millis(120)));
        assert!(timer.elapsed_at(start + Duration::from_millis(220)));
        assert!(!timer.elapsed_at(start + Duration::from_millis(221)));
    }

    #[test]
    fn test_reset_without_evaluating() {
        let start = Instant::now();
        let mut timer = ElapsedTimer::starting_at(Duration::from_millis(100), start);

        timer.reset_at(start + Duration::from_millis(90));
        assert!(!timer.is_elapsed_at(start + Duration::from_millis(150)));
        assert!(timer.is_elapsed_at(start + Duration::from_millis(190)));
    }

    #[test]
    fn test_is_elapsed_does_not_reset() {
        let start = Instant::now();
        let timer = ElapsedTimer::starting_at(Duration::from_millis(50), start);

        assert!(timer.is_elapsed_at(start + Duration::from_millis(60)));
        assert!(timer.is_elapsed_at(start + Duration::from_millis(70)));
    }

    #[test]
    fn test_zero_duration_always_elapsed() {
        let start = Instant::now();
        let mut timer = ElapsedTimer::starting_at(Duration::ZERO, start);
        assert!(timer.elapsed_at(start));
        assert!(timer.elapsed());
    }

    #[test]
    fn test_wall_clock_elapsed() {
        let mut timer = ElapsedTimer::new(Duration::from_millis(20));
        assert!(!timer.elapsed());
        std::thread::sleep(Duration::from_millis(30));
        assert!(timer.elapsed());
    }
}
