use std::thread;
use std::time::Duration;

/// Decides whether and how long to wait after each frame is emitted.
pub trait Pacer {
    fn pace(&mut self);
}

/// Batch mode: no waiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pace(&mut self) {}
}

/// Sleeps one frame interval after every frame, so output trickles out at
/// roughly the video's own speed.
#[derive(Debug, Clone, Copy)]
pub struct RealTimePacer {
    interval: Duration,
}

impl RealTimePacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Pacer for RealTimePacer {
    fn pace(&mut self) {
        thread::sleep(self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_realtime_pacer_waits() {
        let mut pacer = RealTimePacer::new(Duration::from_millis(5));
        let start = Instant::now();
        pacer.pace();
        pacer.pace();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
