//! Single-slot latest-frame cache.
//!
//! The reader thread publishes every acquired frame here; HTTP handlers and
//! other consumers take snapshots at whatever rate they like. Last writer
//! wins, snapshots are deep copies, and the lock is held only for the copy —
//! a slow consumer can observe a stale frame but never a torn one, and never
//! delays the sensor cadence beyond one copy's worth of critical section.

use crate::frame::ThermalFrame;
use std::sync::Mutex;

/// Mutex-guarded holder of the most recently acquired frame.
#[derive(Debug, Default)]
pub struct LatestFrameCache {
    slot: Mutex<Option<ThermalFrame>>,
}

impl LatestFrameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached frame with `frame`. O(1); blocks only for the
    /// slot's critical section.
    pub fn publish(&self, frame: ThermalFrame) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(frame);
    }

    /// Independent copy of the most recent frame, or `None` before the first
    /// publish.
    pub fn snapshot(&self) -> Option<ThermalFrame> {
        self.slot.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PIXEL_COUNT;
    use std::sync::Arc;

    fn constant_frame(value: f32, timestamp: f64) -> ThermalFrame {
        ThermalFrame::new([value; PIXEL_COUNT], timestamp)
    }

    #[test]
    fn test_empty_until_first_publish() {
        let cache = LatestFrameCache::new();
        assert!(cache.snapshot().is_none());
        cache.publish(constant_frame(20.0, 1.0));
        assert!(cache.snapshot().is_some());
    }

    #[test]
    fn test_last_publish_wins() {
        let cache = LatestFrameCache::new();
        cache.publish(constant_frame(20.0, 1.0));
        cache.publish(constant_frame(30.0, 2.0));
        let snap = cache.snapshot().unwrap();
        assert_eq!(snap.timestamp, 2.0);
        assert_eq!(snap.data[0], 30.0);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_publishes() {
        let cache = LatestFrameCache::new();
        cache.publish(constant_frame(20.0, 1.0));
        let snap = cache.snapshot().unwrap();
        cache.publish(constant_frame(99.0, 2.0));
        assert_eq!(snap.data[0], 20.0);
        assert_eq!(snap.timestamp, 1.0);
    }

    #[test]
    fn test_no_tearing_under_concurrent_publish_and_snapshot() {
        // Publishers alternate between two internally-consistent frames;
        // every snapshot must be entirely one of them.
        let cache = Arc::new(LatestFrameCache::new());
        let mut handles = Vec::new();

        for writer in 0..2 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                let value = if writer == 0 { 20.0 } else { 35.0 };
                for i in 0..500 {
                    cache.publish(constant_frame(value, i as f64));
                }
            }));
        }

        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    if let Some(snap) = cache.snapshot() {
                        let first = snap.data[0];
                        assert!(first == 20.0 || first == 35.0);
                        assert!(
                            snap.data.iter().all(|&v| v == first),
                            "torn snapshot observed"
                        );
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
    }
}
