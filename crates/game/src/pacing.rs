use std::time::{Duration, Instant};

/// What [`FramePacer::finish_frame`] measured and did for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Seconds between this frame's start and the previous one's.
    pub delta: f64,
    /// Frames counted in the second that just elapsed, when one did.
    pub fps_report: Option<u32>,
    pub slept: Duration,
}

/// Frame-rate limiter and FPS counter.
///
/// Delta time is measured start-to-start. Frames that finish early sleep
/// away the rest of the target duration; late frames never sleep.
#[derive(Debug, Clone)]
pub struct FramePacer {
    target: Duration,
    last_start: Option<Instant>,
    delta: f64,
    seconds: f64,
    frames: u32,
}

impl FramePacer {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            last_start: None,
            delta: 0.0,
            seconds: 0.0,
            frames: 0,
        }
    }

    /// `None` unless `fps` is positive and finite.
    pub fn from_fps(fps: f64) -> Option<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / fps).ok().map(Self::new)
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// Seconds the previous frame took, start to start. Zero before the
    /// first frame has finished.
    pub fn delta_time(&self) -> f64 {
        self.delta
    }

    /// Anchor delta measurement; the first frame's delta is measured from here.
    pub fn start(&mut self, now: Instant) {
        self.last_start = Some(now);
    }

    /// Time left in the frame budget, truncated to whole microseconds.
    /// `None` once the budget is spent.
    pub fn remaining(&self, frame_start: Instant, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(frame_start);
        let left = self.target.checked_sub(elapsed)?;
        let micros = u64::try_from(left.as_micros()).unwrap_or(u64::MAX);
        (micros > 0).then(|| Duration::from_micros(micros))
    }

    /// Update delta time and the FPS counter for a frame that began at
    /// `frame_start`. Logs the frame count once a second has accumulated.
    pub fn record(&mut self, frame_start: Instant) -> Option<u32> {
        let last = self.last_start.unwrap_or(frame_start);
        self.delta = frame_start.saturating_duration_since(last).as_secs_f64();
        self.last_start = Some(frame_start);
        self.seconds += self.delta;
        self.frames += 1;

        if self.seconds >= 1.0 {
            let fps = self.frames;
            tracing::info!(fps, "FPS: {fps}");
            self.frames = 0;
            self.seconds = 0.0;
            Some(fps)
        } else {
            None
        }
    }

    /// [`FramePacer::record`], then sleep out the remaining budget.
    pub fn finish_frame(&mut self, frame_start: Instant) -> FrameTiming {
        let fps_report = self.record(frame_start);
        let slept = match self.remaining(frame_start, Instant::now()) {
            Some(left) => {
                std::thread::sleep(left);
                left
            }
            None => Duration::ZERO,
        };
        FrameTiming {
            delta: self.delta,
            fps_report,
            slept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn from_fps_rejects_nonsense() {
        assert!(FramePacer::from_fps(0.0).is_none());
        assert!(FramePacer::from_fps(-5.0).is_none());
        assert!(FramePacer::from_fps(f64::NAN).is_none());
        let pacer = FramePacer::from_fps(61.0).unwrap();
        assert_eq!(pacer.target().as_micros(), 16_393);
    }

    #[test]
    fn remaining_is_budget_minus_elapsed() {
        let pacer = FramePacer::new(ms(16));
        let start = Instant::now();
        assert_eq!(pacer.remaining(start, start + ms(10)), Some(ms(6)));
        assert_eq!(pacer.remaining(start, start), Some(ms(16)));
    }

    #[test]
    fn no_sleep_when_over_budget() {
        let pacer = FramePacer::new(ms(16));
        let start = Instant::now();
        assert_eq!(pacer.remaining(start, start + ms(16)), None);
        assert_eq!(pacer.remaining(start, start + ms(40)), None);
    }

    #[test]
    fn remaining_truncates_to_microseconds() {
        let pacer = FramePacer::new(Duration::from_nanos(16_000_999));
        let start = Instant::now();
        assert_eq!(pacer.remaining(start, start), Some(Duration::from_micros(16_000)));
        let pacer = FramePacer::new(Duration::from_nanos(500));
        assert_eq!(pacer.remaining(start, start), None);
    }

    #[test]
    fn delta_is_start_to_start() {
        let mut pacer = FramePacer::new(ms(16));
        let t0 = Instant::now();
        pacer.start(t0);
        pacer.record(t0 + ms(20));
        assert!((pacer.delta_time() - 0.020).abs() < 1e-9);
        pacer.record(t0 + ms(50));
        assert!((pacer.delta_time() - 0.030).abs() < 1e-9);
    }

    #[test]
    fn fps_is_reported_once_a_second_and_resets() {
        let mut pacer = FramePacer::new(ms(16));
        let t0 = Instant::now();
        pacer.start(t0);
        let mut reports = Vec::new();
        for i in 1..=10 {
            if let Some(fps) = pacer.record(t0 + ms(250 * i)) {
                reports.push(fps);
            }
        }
        assert_eq!(reports, vec![4, 4]);
    }

    #[test]
    fn first_frame_without_start_has_zero_delta() {
        let mut pacer = FramePacer::new(ms(16));
        pacer.record(Instant::now());
        assert_eq!(pacer.delta_time(), 0.0);
    }

    #[test]
    fn finish_frame_sleeps_out_the_budget() {
        let mut pacer = FramePacer::new(ms(20));
        let start = Instant::now();
        pacer.start(start);
        let timing = pacer.finish_frame(start);
        let elapsed = start.elapsed();
        assert!(elapsed >= ms(19), "frame ended after {elapsed:?}");
        assert!(elapsed < ms(500), "frame ended after {elapsed:?}");
        assert!(timing.slept > Duration::ZERO);
    }

    #[test]
    fn finish_frame_over_budget_does_not_sleep() {
        let mut pacer = FramePacer::new(ms(1));
        let start = Instant::now() - ms(5);
        let timing = pacer.finish_frame(start);
        assert_eq!(timing.slept, Duration::ZERO);
    }
}
